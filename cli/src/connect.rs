//! Opens an authenticated SSH session for the engine.

use engine::SshSession;
use log::{debug, info};
use ssh2::Session;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::Profile;

/// Connect, handshake and authenticate.
///
/// Authentication tries the identity file, then the agent, then the
/// password, stopping at the first method the server accepts.
pub fn connect(profile: &Profile) -> Result<SshSession, String> {
    let (host, username) = profile.require_target()?;
    let timeout = Duration::from_secs(profile.connect_timeout_secs);

    let addr = (host, profile.port)
        .to_socket_addrs()
        .map_err(|e| format!("Cannot resolve {}:{}: {}", host, profile.port, e))?
        .next()
        .ok_or_else(|| format!("No address found for {}", host))?;

    info!("Connecting to {} ({})", host, addr);
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("Connection to {} failed: {}", addr, e))?;

    let mut session = Session::new().map_err(|e| format!("Cannot create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session
        .handshake()
        .map_err(|e| format!("SSH handshake with {} failed: {}", host, e))?;

    authenticate(&session, username, profile)?;

    // Transfers and commands may legitimately run longer than the connect timeout
    session.set_timeout(0);
    info!("Authenticated as {} on {}", username, host);
    Ok(SshSession::new(session))
}

fn authenticate(session: &Session, username: &str, profile: &Profile) -> Result<(), String> {
    if let Some(identity) = &profile.identity_file {
        match session.userauth_pubkey_file(username, None, identity, None) {
            Ok(()) => return Ok(()),
            Err(e) => debug!("Key {} rejected: {}", identity.display(), e),
        }
    }

    if profile.use_agent {
        match session.userauth_agent(username) {
            Ok(()) => return Ok(()),
            Err(e) => debug!("Agent authentication failed: {}", e),
        }
    }

    if let Some(password) = &profile.password {
        match session.userauth_password(username, password) {
            Ok(()) => return Ok(()),
            Err(e) => debug!("Password authentication failed: {}", e),
        }
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err(format!("All authentication methods failed for {}", username))
    }
}
