//! Build script for mcp-peer-rs.
//!
//! Intentionally minimal, following Rust best practices for library crates:
//! records the crate version for diagnostics and configures rebuild triggers.
//! Documentation generation is left to docs.rs.

fn main() {
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=Cargo.toml");

    println!(
        "cargo:rustc-env=MCP_PEER_RS_VERSION={}",
        env!("CARGO_PKG_VERSION")
    );
}
