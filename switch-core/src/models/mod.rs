//! One adapter per supported switch model.

pub mod binardat_10g08;
pub mod sl_swtg124as;
pub mod sl_swtgw218as;
pub mod vm_s100_0800ms;

mod pages;

pub use binardat_10g08::Binardat10G08;
pub use sl_swtg124as::SlSwtg124As;
pub use sl_swtgw218as::SlSwtgw218As;
pub use vm_s100_0800ms::VmS1000800Ms;
