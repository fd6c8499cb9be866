//! prebuild-lib: build-or-download installation of native Node.js modules.
//!
//! This crate provides the pieces behind the `prebuild` command:
//! - `identity`: the canonical artifact name for a package on a runtime
//! - `build`: driving `node-gyp` and relocating its output
//! - `download`: fetching and gunzipping a prebuilt artifact
//! - `install`: the build, then download, fallback state machine
//! - `upload`: publishing a built artifact to the object store
//! - `load`: loading the installed binary once per process

pub mod build;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod download;
pub mod identity;
pub mod install;
pub mod load;
pub mod package;
pub mod paths;
pub mod platform;
pub mod upload;
pub mod util;
