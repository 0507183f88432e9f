//! Optional process-wide tracing setup. Library code never calls this —
//! it is a convenience for binaries embedding this crate that don't already
//! run their own subscriber.

#[cfg(feature = "tracing-subscriber")]
pub fn init_default() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(not(feature = "tracing-subscriber"))]
pub fn init_default() {}
