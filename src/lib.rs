//! Dead function elimination for WebAssembly modules.
//!
//! ```no_run
//! let wasm = std::fs::read("app.wasm").unwrap();
//! let (optimized, stats) = wasmdce::eliminate(&wasm).unwrap();
//! println!("{stats}");
//! std::fs::write("app.opt.wasm", optimized).unwrap();
//! ```

pub mod binary;
pub mod error;
pub mod optimize;

pub use error::{Error, Result};
pub use optimize::{Options, Stats, eliminate, eliminate_with};
