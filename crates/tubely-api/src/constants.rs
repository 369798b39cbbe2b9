/// Slack on top of the payload ceiling for multipart boundaries and part headers.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Issuer claim on access tokens.
pub const TOKEN_ISSUER: &str = "tubely-access";

/// Filename prefix for staged uploads in the scratch directory.
pub const SCRATCH_FILE_PREFIX: &str = "tubely-upload-";
