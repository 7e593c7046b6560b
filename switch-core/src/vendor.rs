//! MAC address to manufacturer lookup through the macvendors.com API.
//!
//! Answers are cached per OUI. Lookups are spaced at least `delay` apart and
//! the spacing doubles (up to [`MAX_DELAY`]) each time the API answers 429.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::session::{Request, Transport};

pub const MAC_VENDOR_API: &str = "https://api.macvendors.com";
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const MAX_DELAY: Duration = Duration::from_secs(10);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VendorLookup {
    Vendor(String),
    UnknownVendor,
    Unregistered,
    RateLimited,
    ApiError,
    LookupFailed,
    InvalidMac,
}

impl VendorLookup {
    /// Transient answers are worth asking again later and are not cached.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            VendorLookup::Vendor(_) | VendorLookup::UnknownVendor | VendorLookup::Unregistered
        )
    }
}

impl fmt::Display for VendorLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorLookup::Vendor(name) => f.write_str(name),
            VendorLookup::UnknownVendor => f.write_str("Unknown Vendor"),
            VendorLookup::Unregistered => f.write_str("Unregistered OUI"),
            VendorLookup::RateLimited => f.write_str("Rate Limited"),
            VendorLookup::ApiError => f.write_str("API Error"),
            VendorLookup::LookupFailed => f.write_str("Lookup Failed"),
            VendorLookup::InvalidMac => f.write_str("Invalid MAC"),
        }
    }
}

struct LimiterState {
    cache: HashMap<String, VendorLookup>,
    last_lookup: Option<Instant>,
    delay: Duration,
}

pub struct VendorResolver {
    transport: Arc<dyn Transport>,
    api: String,
    state: Mutex<LimiterState>,
}

impl VendorResolver {
    pub fn new(transport: Arc<dyn Transport>, delay: Duration) -> Self {
        Self {
            transport,
            api: MAC_VENDOR_API.to_string(),
            state: Mutex::new(LimiterState {
                cache: HashMap::new(),
                last_lookup: None,
                delay,
            }),
        }
    }

    pub fn with_api(mut self, api: &str) -> Self {
        self.api = api.trim_end_matches('/').to_string();
        self
    }

    /// First six hex digits of `mac`, upper-cased.
    pub fn oui(mac: &str) -> Option<String> {
        let clean: String = mac
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if clean.len() < 6 {
            return None;
        }
        Some(clean[..6].to_string())
    }

    /// Vendor of `mac`, from the cache or the API.
    ///
    /// The lock is released before the network call, so two threads resolving
    /// the same uncached OUI may both query the API. Their requests are still
    /// spaced by the current delay.
    pub fn resolve(&self, mac: &str) -> VendorLookup {
        let Some(oui) = Self::oui(mac) else {
            return VendorLookup::InvalidMac;
        };

        {
            let mut state = self.state();
            if let Some(hit) = state.cache.get(&oui) {
                return hit.clone();
            }
            // Sleeping with the lock held keeps concurrent callers spaced too.
            if let Some(last) = state.last_lookup {
                let elapsed = last.elapsed();
                if elapsed < state.delay {
                    std::thread::sleep(state.delay - elapsed);
                }
            }
            state.last_lookup = Some(Instant::now());
        }

        let request = Request::get(format!("{}/{}", self.api, mac)).timeout(LOOKUP_TIMEOUT);
        let answer = match self.transport.send(request) {
            Ok(reply) => match reply.status {
                200 => {
                    let vendor = reply.body.trim();
                    if vendor.is_empty() || vendor.starts_with("Not Found") {
                        VendorLookup::UnknownVendor
                    } else {
                        VendorLookup::Vendor(vendor.to_string())
                    }
                }
                404 => VendorLookup::Unregistered,
                429 => {
                    let mut state = self.state();
                    state.delay = (state.delay * 2).min(MAX_DELAY);
                    warn!(
                        "MAC vendor API rate limited, spacing lookups {:?} apart",
                        state.delay
                    );
                    VendorLookup::RateLimited
                }
                status => {
                    debug!("MAC vendor API answered {} for {}", status, mac);
                    VendorLookup::ApiError
                }
            },
            Err(err) => {
                warn!("error resolving MAC vendor for {}: {}", mac, err);
                VendorLookup::LookupFailed
            }
        };

        if answer.is_definitive() {
            self.state().cache.insert(oui, answer.clone());
        }
        answer
    }

    pub fn cache_len(&self) -> usize {
        self.state().cache.len()
    }

    pub fn current_delay(&self) -> Duration {
        self.state().delay
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
