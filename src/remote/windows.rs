//! Network provider connections for UNC share access.
//!
//! The mounted store reaches `\\host\share` through the OS SMB client. When a
//! host entry carries credentials, they are registered against the host's
//! `IPC$` share before any share is touched and released when the session
//! closes.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use widestring::U16CString;
use winapi::shared::minwindef::{DWORD, TRUE};
use winapi::shared::winerror::{ERROR_SESSION_CREDENTIAL_CONFLICT, NO_ERROR};
use winapi::um::winnetwk::{
    WNetAddConnection2W, WNetCancelConnection2W, NETRESOURCEW, RESOURCETYPE_ANY,
};

use crate::config::HostConfig;

/// An authenticated connection to `\\address\IPC$`.
#[derive(Debug)]
pub struct NetworkConnection {
    remote_name: String,
}

impl NetworkConnection {
    /// Register the host credentials with the network provider.
    ///
    /// Returns `None` when the host has no username, or when a connection to
    /// the host already exists with other credentials. Either way the existing
    /// logon session is used as-is and nothing is released on close.
    pub async fn establish(host: &HostConfig) -> Result<Option<Self>> {
        if host.credentials.username.is_empty() {
            debug!("No credentials for {}; using current logon session", host.address);
            return Ok(None);
        }

        let remote_name = format!(r"\\{}\IPC$", host.address);
        let username = host.credentials.qualified_username();
        let password = host.credentials.password.clone();
        let target = remote_name.clone();

        let created = tokio::task::spawn_blocking(move || add_connection(&target, &username, &password))
            .await
            .context("Connection task failed")??;

        if !created {
            // Not ours to cancel on close.
            return Ok(None);
        }

        debug!("Registered network connection {}", remote_name);
        Ok(Some(Self { remote_name }))
    }

    /// Release the connection.
    pub async fn cancel(self) -> Result<()> {
        let remote_name = self.remote_name;
        tokio::task::spawn_blocking(move || cancel_connection(&remote_name))
            .await
            .context("Disconnect task failed")?
    }
}

fn to_wide(value: &str, what: &str) -> Result<U16CString> {
    U16CString::from_str(value).map_err(|_| anyhow!("{} contains a null character", what))
}

/// `Ok(true)` when this call created the connection.
fn add_connection(remote_name: &str, username: &str, password: &str) -> Result<bool> {
    let wide_remote = to_wide(remote_name, "remote name")?;
    let wide_user = to_wide(username, "username")?;
    let wide_password = to_wide(password, "password")?;

    // SAFETY: NETRESOURCEW is a plain C struct; all-zero is a valid value.
    let mut resource: NETRESOURCEW = unsafe { std::mem::zeroed() };
    resource.dwType = RESOURCETYPE_ANY;
    resource.lpRemoteName = wide_remote.as_ptr() as *mut u16;

    // SAFETY: every pointer refers to a NUL-terminated buffer that outlives the call.
    let status = unsafe {
        WNetAddConnection2W(&mut resource, wide_password.as_ptr(), wide_user.as_ptr(), 0)
    };

    add_connection_outcome(remote_name, status)
}

fn add_connection_outcome(remote_name: &str, status: DWORD) -> Result<bool> {
    match status {
        NO_ERROR => Ok(true),
        ERROR_SESSION_CREDENTIAL_CONFLICT => {
            warn!(
                "An existing connection to {} uses other credentials; reusing it and leaving it open",
                remote_name
            );
            Ok(false)
        }
        code => Err(anyhow!(
            "WNetAddConnection2W failed for {} (error {})",
            remote_name,
            code
        )),
    }
}

fn cancel_connection(remote_name: &str) -> Result<()> {
    let wide_remote = to_wide(remote_name, "remote name")?;

    // SAFETY: the name buffer is NUL-terminated and outlives the call.
    let status = unsafe { WNetCancelConnection2W(wide_remote.as_ptr(), 0, TRUE) };

    if status == NO_ERROR {
        Ok(())
    } else {
        Err(anyhow!(
            "WNetCancelConnection2W failed for {} (error {})",
            remote_name,
            status
        ))
    }
}
