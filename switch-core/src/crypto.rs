//! Credential encodings the switch login pages compute in JavaScript.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Lowercase hex MD5 of `username + password`, used as the `admin` cookie.
pub fn credential_hash(username: &str, password: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", username, password)))
}

pub fn base64(text: &str) -> String {
    STANDARD.encode(text)
}

/// RC4 keystream applied to `text`, each output byte written in decimal and
/// followed by `,,`.
///
/// Swaps are done with XOR the way the login script does them, so a swap of
/// a slot with itself zeroes that slot. Plain RC4 would not interoperate.
pub fn rc4_encode(key: &str, text: &str) -> String {
    let key: Vec<u32> = key.chars().map(|c| c as u32).collect();
    let mut s: [u32; 256] = std::array::from_fn(|i| i as u32);

    if !key.is_empty() {
        let mut j = 0usize;
        for i in 0..256 {
            j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
            xor_swap(&mut s, i, j);
        }
    }

    let mut out = String::new();
    let (mut i, mut j) = (0usize, 0usize);
    for c in text.chars() {
        i = (i + 1) % 256;
        j = (j + s[i] as usize) % 256;
        xor_swap(&mut s, i, j);
        let t = (s[i] as usize + s[j] as usize % 256) % 256;
        out.push_str(&((c as u32) ^ s[t]).to_string());
        out.push_str(",,");
    }
    out
}

fn xor_swap(s: &mut [u32; 256], i: usize, j: usize) {
    s[i] ^= s[j];
    s[j] ^= s[i];
    s[i] ^= s[j];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_hash_matches_login_script() {
        assert_eq!(
            credential_hash("admin", "admin"),
            "f6fdffe48c908deb0f4c3bd36c032e72"
        );
    }

    #[test]
    fn rc4_matches_reference_vector() {
        // Classic "Key"/"Plaintext" vector: BB F3 16 E8 D9 40 AF 0A D3.
        assert_eq!(
            rc4_encode("Key", "Plaintext"),
            "187,,243,,22,,232,,217,,64,,175,,10,,211,,"
        );
    }

    #[test]
    fn rc4_with_login_key() {
        assert_eq!(
            rc4_encode("iensuegdul27c90d", "admin"),
            "126,,103,,178,,61,,175,,"
        );
        assert_eq!(rc4_encode("iensuegdul27c90d", "P@ss"), "79,,67,,172,,39,,");
        assert_eq!(rc4_encode("iensuegdul27c90d", ""), "");
    }

    #[test]
    fn base64_cookie_value() {
        assert_eq!(base64("admin"), "YWRtaW4=");
    }
}
