//! A narrow async FTP client: just what the end-to-end suite exercises.
//!
//! Passive mode only. Data connections go to the control connection's peer
//! address with the port from the `227` reply, which keeps NATed container
//! setups (that advertise an internal address) working.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{FtpError, Result};
use crate::reply::{parse_pasv, parse_quoted_path, parse_status_line, Reply};

/// Limits for connecting and for waiting on any single read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for FtpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(30),
        }
    }
}

impl FtpTimeouts {
    pub fn with_connect(mut self, connect: Duration) -> Self {
        self.connect = connect;
        self
    }

    pub fn with_read(mut self, read: Duration) -> Self {
        self.read = read;
        self
    }
}

pub struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: IpAddr,
    timeouts: FtpTimeouts,
    greeting: Reply,
}

impl FtpClient {
    /// Open the control connection and wait for the `220` greeting.
    pub async fn connect(host: &str, port: u16, timeouts: FtpTimeouts) -> Result<Self> {
        let operation = format!("connect to {host}:{port}");
        let stream = bounded(timeouts.connect, &operation, TcpStream::connect((host, port))).await??;
        let peer = stream.peer_addr()?.ip();
        let (read, write) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
            peer,
            timeouts,
            greeting: Reply {
                code: 0,
                lines: Vec::new(),
            },
        };

        let mut greeting = client.read_reply("greeting").await?;
        // 120: "service ready in nnn minutes", the 220 follows.
        while greeting.code == 120 {
            greeting = client.read_reply("greeting").await?;
        }
        if greeting.code != 220 {
            return Err(unexpected("greeting", &greeting));
        }
        debug!(%peer, port, greeting = %greeting.message(), "Connected");
        client.greeting = greeting;
        Ok(client)
    }

    pub fn greeting(&self) -> &Reply {
        &self.greeting
    }

    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let reply = self.command(&format!("USER {user}")).await?;
        match reply.code {
            230 => return Ok(()),
            331 | 332 => {}
            _ => return Err(unexpected("USER", &reply)),
        }
        self.expect(&format!("PASS {password}"), &[230, 202]).await?;
        Ok(())
    }

    /// Names in `path` (or the working directory), reduced to their last
    /// path segment.
    pub async fn list_names(&mut self, path: Option<&str>) -> Result<Vec<String>> {
        let mut data = self.open_data().await?;
        let command = match path {
            Some(path) => format!("NLST {path}"),
            None => "NLST".to_string(),
        };

        let reply = self.command(&command).await?;
        // Some servers answer an empty directory with "no files found".
        if matches!(reply.code, 450 | 550) {
            debug!(code = reply.code, message = %reply.message(), "Listing reported no files");
            return Ok(Vec::new());
        }
        if !reply.is_preliminary() {
            return Err(unexpected("NLST", &reply));
        }

        let mut raw = Vec::new();
        bounded(self.timeouts.read, "NLST data", data.read_to_end(&mut raw)).await??;
        drop(data);
        self.finish_transfer("NLST").await?;

        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(last_segment)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
            .collect())
    }

    /// Store `bytes` at `path` in binary mode, creating missing parent
    /// directories first when asked.
    pub async fn upload(&mut self, path: &str, bytes: &[u8], create_remote_dir: bool) -> Result<()> {
        self.expect("TYPE I", &[200]).await?;
        if create_remote_dir {
            self.create_parents(path).await?;
        }

        let mut data = self.open_data().await?;
        self.start_transfer(&format!("STOR {path}")).await?;
        bounded(self.timeouts.read, "STOR data", data.write_all(bytes)).await??;
        bounded(self.timeouts.read, "STOR data", data.shutdown()).await??;
        drop(data);
        self.finish_transfer("STOR").await
    }

    pub async fn download(&mut self, path: &str) -> Result<Vec<u8>> {
        self.expect("TYPE I", &[200]).await?;

        let mut data = self.open_data().await?;
        self.start_transfer(&format!("RETR {path}")).await?;
        let mut bytes = Vec::new();
        bounded(self.timeouts.read, "RETR data", data.read_to_end(&mut bytes)).await??;
        drop(data);
        self.finish_transfer("RETR").await?;
        Ok(bytes)
    }

    pub async fn set_working_directory(&mut self, path: &str) -> Result<()> {
        self.expect(&format!("CWD {path}"), &[200, 250]).await?;
        Ok(())
    }

    pub async fn working_directory(&mut self) -> Result<String> {
        let reply = self.expect("PWD", &[257]).await?;
        parse_quoted_path(&reply.message()).ok_or_else(|| FtpError::MalformedReply(reply.message()))
    }

    pub async fn quit(mut self) -> Result<()> {
        self.expect("QUIT", &[221]).await?;
        Ok(())
    }

    async fn create_parents(&mut self, path: &str) -> Result<()> {
        let mut prefix = String::new();
        let segments: Vec<&str> = path.split('/').collect();
        let parents = &segments[..segments.len().saturating_sub(1)];

        for (index, segment) in parents.iter().enumerate() {
            if segment.is_empty() {
                if index == 0 {
                    prefix.push('/');
                }
                continue;
            }
            if !prefix.is_empty() && !prefix.ends_with('/') {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let reply = self.command(&format!("MKD {prefix}")).await?;
            match reply.code {
                257 => debug!(directory = %prefix, "Created remote directory"),
                // Most servers reuse 550 for "already exists"; a real problem
                // surfaces on the following STOR.
                521 | 550 => debug!(directory = %prefix, "Remote directory assumed to exist"),
                _ => return Err(unexpected("MKD", &reply)),
            }
        }
        Ok(())
    }

    async fn open_data(&mut self) -> Result<TcpStream> {
        let reply = self.expect("PASV", &[227]).await?;
        let port =
            parse_pasv(&reply.message()).ok_or_else(|| FtpError::MalformedReply(reply.message()))?;

        debug!(peer = %self.peer, port, "Opening passive data connection");
        let stream = bounded(
            self.timeouts.connect,
            "data connection",
            TcpStream::connect((self.peer, port)),
        )
        .await??;
        Ok(stream)
    }

    async fn start_transfer(&mut self, command: &str) -> Result<()> {
        let reply = self.command(command).await?;
        if reply.is_preliminary() {
            Ok(())
        } else {
            Err(unexpected(verb(command), &reply))
        }
    }

    async fn finish_transfer(&mut self, verb: &str) -> Result<()> {
        let reply = self.read_reply(verb).await?;
        match reply.code {
            226 | 250 => Ok(()),
            _ => Err(unexpected(verb, &reply)),
        }
    }

    async fn expect(&mut self, command: &str, accepted: &[u16]) -> Result<Reply> {
        let reply = self.command(command).await?;
        if accepted.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(unexpected(verb(command), &reply))
        }
    }

    async fn command(&mut self, command: &str) -> Result<Reply> {
        let verb = verb(command);
        let shown = if verb.eq_ignore_ascii_case("PASS") {
            "PASS ****"
        } else {
            command
        };
        debug!(command = shown, "FTP >");

        let line = format!("{command}\r\n");
        bounded(self.timeouts.read, verb, self.writer.write_all(line.as_bytes())).await??;
        self.read_reply(verb).await
    }

    async fn read_reply(&mut self, operation: &str) -> Result<Reply> {
        let first = self.read_line(operation).await?;
        let (code, last, text) =
            parse_status_line(&first).ok_or_else(|| FtpError::MalformedReply(first.clone()))?;

        let mut lines = vec![text.to_string()];
        if !last {
            loop {
                let line = self.read_line(operation).await?;
                match parse_status_line(&line) {
                    Some((c, done, text)) if c == code => {
                        lines.push(text.to_string());
                        if done {
                            break;
                        }
                    }
                    _ => lines.push(line.trim_start().to_string()),
                }
            }
        }

        let reply = Reply { code, lines };
        debug!(code, message = %reply.message(), "FTP <");
        Ok(reply)
    }

    async fn read_line(&mut self, operation: &str) -> Result<String> {
        let mut line = String::new();
        let read = bounded(self.timeouts.read, operation, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            return Err(FtpError::Closed);
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }
}

async fn bounded<F: Future>(limit: Duration, operation: &str, future: F) -> Result<F::Output> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| FtpError::Timeout {
            operation: operation.to_string(),
        })
}

fn verb(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

fn unexpected(command: &str, reply: &Reply) -> FtpError {
    FtpError::UnexpectedReply {
        command: command.to_string(),
        code: reply.code,
        message: reply.message(),
    }
}

fn last_segment(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
