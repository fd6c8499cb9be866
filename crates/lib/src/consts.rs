/// Name used for temp-file prefixes.
pub const APP_NAME: &str = "prebuild";

/// Host serving prebuilt artifacts.
pub const DOWNLOAD_HOST: &str = "https://download.newrelic.com/";

/// Path prefix shared by the download URL and the upload key.
pub const REMOTE_PATH: &str = "nodejs_agent/builds/";

/// Object-store bucket artifacts are published to.
pub const UPLOAD_BUCKET: &str = "nr-downloads-main";

/// Suffix of the native module binary.
pub const BINARY_SUFFIX: &str = ".node";

/// Suffix of the compressed package published remotely.
pub const ARCHIVE_SUFFIX: &str = ".gz";

/// Build output location, relative to the package root.
pub const BUILD_OUTPUT_DIR: &str = "build/Release";

/// Package manifest providing name and version.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Build target used when none is given on the command line.
pub const DEFAULT_TARGET: &str = "native";

#[cfg(windows)]
pub const NODE_GYP: &str = "node-gyp.cmd";

#[cfg(not(windows))]
pub const NODE_GYP: &str = "node-gyp";
