//! Tunnels to a daemon through the `ssh` client.
//!
//! A host such as `ssh://user@host:2222` is reached by running
//! `docker system dial-stdio` on the remote machine and speaking HTTP over
//! the standard input and output of the `ssh` process.

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::Context;
use std::task::Poll;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tracing::debug;
use url::Host;
use url::Url;

use crate::Error;
use crate::Result;

/// The host requests are addressed to when tunnelling over SSH.
///
/// The daemon on the other end of `dial-stdio` ignores it.
pub const EFFECTIVE_HOST: &str = "http://docker.example.com";

/// The name of the `ssh` client executable.
#[cfg(not(windows))]
const PROGRAM_NAME: &str = "ssh";

/// The name of the `ssh` client executable.
#[cfg(windows)]
const PROGRAM_NAME: &str = "ssh.exe";

/// The connect timeout added when the options don't specify one.
const CONNECT_TIMEOUT_OPTION: &str = "ConnectTimeout=30";

/// The `ssh` client used to open tunnels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Program {
    /// Search the directories listed in `PATH`.
    #[default]
    Search,

    /// Use the executable at the given path.
    Path(PathBuf),

    /// There is no `ssh` client.
    ///
    /// SSH hosts are then connected to directly.
    Disabled,
}

impl Program {
    /// Locates the executable.
    ///
    /// Returns `None` when no executable is available.
    pub fn locate(&self) -> Option<PathBuf> {
        match self {
            Self::Search => {
                let paths = std::env::var_os("PATH")?;
                std::env::split_paths(&paths)
                    .map(|dir| dir.join(PROGRAM_NAME))
                    .find(|candidate| candidate.is_file())
            }
            Self::Path(path) => path.is_file().then(|| path.clone()),
            Self::Disabled => None,
        }
    }
}

/// The parts of an `ssh://` host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Destination {
    /// The login name.
    user: Option<String>,

    /// The host name or address.
    host: String,

    /// The port.
    port: Option<u16>,
}

impl Destination {
    /// Parses an `ssh://` host.
    ///
    /// Passwords are not accepted, a host is required, and nothing may follow
    /// the host and port.
    pub fn parse(host: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Ssh {
            host: host.to_string(),
            reason,
        };

        let url = Url::parse(host).map_err(|e| invalid(e.to_string()))?;

        if url.scheme() != "ssh" {
            return Err(invalid(format!(
                "expected scheme ssh, got `{}`",
                url.scheme()
            )));
        }

        if url.password().is_some() {
            return Err(invalid(String::from(
                "plain-text password is not supported",
            )));
        }

        let name = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };

        if name.is_empty() {
            return Err(invalid(String::from("no host specified")));
        }

        if !url.path().is_empty() {
            return Err(invalid(format!(
                "extra path after the host: `{}`",
                url.path()
            )));
        }

        if let Some(query) = url.query() {
            return Err(invalid(format!("extra query after the host: `{query}`")));
        }

        if let Some(fragment) = url.fragment() {
            return Err(invalid(format!(
                "extra fragment after the host: `{fragment}`"
            )));
        }

        let user = Some(url.username())
            .filter(|user| !user.is_empty())
            .map(String::from);

        Ok(Self {
            user,
            host: name,
            port: url.port(),
        })
    }

    /// Gets the login name (if available).
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Gets the host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Gets the port (if available).
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Gets the arguments that select this destination and run `command`
    /// there.
    fn args<'a>(&self, command: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(user) = &self.user {
            args.push(String::from("-l"));
            args.push(user.clone());
        }

        if let Some(port) = self.port {
            args.push(String::from("-p"));
            args.push(port.to_string());
        }

        args.push(String::from("--"));
        args.push(self.host.clone());
        args.extend(command.into_iter().map(String::from));
        args
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }

        write!(f, "{}", self.host)?;

        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }

        Ok(())
    }
}

/// Runs `docker system dial-stdio` on a remote machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Helper {
    /// The `ssh` executable.
    program: PathBuf,

    /// The arguments handed to the executable.
    args: Vec<String>,

    /// The remote machine.
    destination: Destination,
}

impl Helper {
    /// Gets the `ssh` executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Gets the arguments handed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Gets the remote machine.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Gets the host requests are addressed to.
    pub fn host(&self) -> &'static str {
        EFFECTIVE_HOST
    }

    /// Starts a new tunnel.
    pub fn dial(&self) -> io::Result<Tunnel> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("the standard input of `ssh` is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("the standard output of `ssh` is not piped"))?;

        Ok(Tunnel {
            _child: child,
            stdin,
            stdout,
        })
    }
}

/// Resolves the helper used to reach `host`.
///
/// Returns `Ok(None)` when the host is not an `ssh://` host or when no `ssh`
/// client is available.
pub fn resolve(host: &str, opts: &[String], program: &Program) -> Result<Option<Helper>> {
    if !host.starts_with(dockwright_config::connection::SSH_SCHEME) {
        return Ok(None);
    }

    let destination = Destination::parse(host)?;

    let Some(program) = program.locate() else {
        debug!("no `ssh` client was found: connecting to `{host}` directly");
        return Ok(None);
    };

    let mut args = opts.to_vec();

    if !args.iter().any(|opt| opt.contains("ConnectTimeout")) {
        args.push(String::from("-o"));
        args.push(String::from(CONNECT_TIMEOUT_OPTION));
    }

    if !args.iter().any(|opt| opt == "-T") {
        args.push(String::from("-T"));
    }

    args.extend(destination.args(["docker", "system", "dial-stdio"]));

    Ok(Some(Helper {
        program,
        args,
        destination,
    }))
}

/// A running `ssh` process.
///
/// Reads come from the process's standard output and writes go to its
/// standard input. The process is killed when the tunnel is dropped.
#[derive(Debug)]
pub struct Tunnel {
    /// The process.
    _child: Child,

    /// The standard input of the process.
    stdin: ChildStdin,

    /// The standard output of the process.
    stdout: ChildStdout,
}

impl AsyncRead for Tunnel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tunnel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
