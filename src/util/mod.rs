use num_bigint::BigInt;

pub type Number = BigInt;

// Thanks: https://www.reddit.com/r/rust/comments/bkkpkz/pkgversion_access_your_crates_version_number_as/
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
