//! Global constants for the pst-collector application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Discovery defaults
/// Placeholder substituted with the username in search-root templates
pub const USER_PLACEHOLDER: &str = "{user}";

/// Share scanned when a host lists none
pub const DEFAULT_SHARE: &str = "C$";

/// Search roots used for users without an override, in scan order
pub const DEFAULT_SEARCH_ROOTS: [&str; 2] = [
    "Users/{user}/AppData/Local/Microsoft/Outlook",
    "Users/{user}/Documents/Outlook Files",
];

/// Archive extensions collected by default (compared case-insensitively)
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["pst", "ost"];

// Connection defaults
/// Default SMB port
pub const SMB_DEFAULT_PORT: u16 = 445;

/// Client name used when the local hostname cannot be determined
pub const FALLBACK_CLIENT_NAME: &str = "collector";

/// Share-root template for the mounted store on Windows (UNC path)
pub const WINDOWS_SHARE_ROOT_TEMPLATE: &str = r"\\{address}\{share}";

/// Share-root template for the mounted store elsewhere (pre-mounted shares)
pub const UNIX_SHARE_ROOT_TEMPLATE: &str = "/mnt/smb/{address}/{share}";

// Timeout constants
/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default directory listing timeout in seconds
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout for a fetch (open and each read) in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

// Copy constants
/// Buffer size for streaming remote files to disk (1MB)
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Suffix of in-flight destination files
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Default number of hosts processed at once
pub const DEFAULT_MAX_CONCURRENT_HOSTS: usize = 1;

/// File name of the JSON run summary written into the destination
pub const SUMMARY_FILE_NAME: &str = "collection_summary.json";

// PDF reduction constants
/// Default relative tolerance above the target size
pub const PDF_DEFAULT_TOLERANCE: f64 = 0.05;

/// Default lowest JPEG quality tried
pub const PDF_DEFAULT_MIN_QUALITY: u8 = 20;

/// Default highest JPEG quality tried
pub const PDF_DEFAULT_MAX_QUALITY: u8 = 95;

/// Default bisection iteration cap
pub const PDF_DEFAULT_MAX_ITERATIONS: u32 = 8;
