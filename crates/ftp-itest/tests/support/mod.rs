//! In-process FTP server for tests that must run without Docker.
//!
//! Speaks just enough of the protocol for the client and the suite: login,
//! passive transfers (NLST, STOR, RETR), MKD, CWD and PWD over an in-memory
//! tree.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const DATA_ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub user: String,
    pub password: String,
    /// Answer PWD with 502 when false.
    pub pwd_supported: bool,
    /// Accept connections but never send the greeting when false.
    pub greet: bool,
    pub multiline_greeting: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            user: "bob".to_string(),
            password: "12345".to_string(),
            pwd_supported: true,
            greet: true,
            multiline_greeting: true,
        }
    }
}

#[derive(Debug)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            dirs: BTreeSet::from(["/".to_string()]),
        }
    }
}

impl Tree {
    fn children(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .dirs
            .iter()
            .filter(|path| path.as_str() != "/")
            .chain(self.files.keys())
            .filter(|path| parent(path) == dir)
            .map(|path| file_name(path).to_string())
            .collect();
        names.sort();
        names
    }
}

type SharedTree = Arc<Mutex<Tree>>;

fn lock(tree: &SharedTree) -> std::sync::MutexGuard<'_, Tree> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ScriptedFtpServer {
    addr: SocketAddr,
    tree: SharedTree,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedFtpServer {
    pub async fn start(options: ServerOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind scripted FTP listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read scripted FTP listener address")?;

        let tree = SharedTree::default();
        let options = Arc::new(options);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let accept_tree = Arc::clone(&tree);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((socket, _)) = accepted else { break };
                        let options = Arc::clone(&options);
                        let tree = Arc::clone(&accept_tree);
                        tokio::spawn(async move {
                            if let Err(err) = serve(socket, options, tree).await {
                                eprintln!("scripted FTP session ended: {err:#}");
                            }
                        });
                    }
                }
            }
        });

        Ok(Self {
            addr,
            tree,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.tree).files.get(path).cloned()
    }

    pub fn file_paths(&self) -> Vec<String> {
        lock(&self.tree).files.keys().cloned().collect()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScriptedFtpServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct SessionState {
    user: Option<String>,
    logged_in: bool,
    cwd: String,
    passive: Option<TcpListener>,
}

async fn reply(writer: &mut OwnedWriteHalf, text: &str) -> Result<()> {
    writer.write_all(format!("{text}\r\n").as_bytes()).await?;
    Ok(())
}

async fn serve(socket: TcpStream, options: Arc<ServerOptions>, tree: SharedTree) -> Result<()> {
    let (read, mut writer) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    if !options.greet {
        while lines.next_line().await?.is_some() {}
        return Ok(());
    }
    if options.multiline_greeting {
        reply(&mut writer, "220-Scripted FTP server\r\n220-no anonymous logins\r\n220 ready").await?;
    } else {
        reply(&mut writer, "220 ready").await?;
    }

    let mut state = SessionState {
        user: None,
        logged_in: false,
        cwd: "/".to_string(),
        passive: None,
    };

    while let Some(line) = lines.next_line().await? {
        let (verb, arg) = match line.trim().split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.trim().to_string()),
            None => (line.trim().to_ascii_uppercase(), String::new()),
        };

        if !state.logged_in && !matches!(verb.as_str(), "USER" | "PASS" | "QUIT") {
            reply(&mut writer, "530 Please login with USER and PASS.").await?;
            continue;
        }

        match verb.as_str() {
            "USER" => {
                state.user = Some(arg);
                reply(&mut writer, "331 User name okay, need password.").await?;
            }
            "PASS" => {
                if state.user.as_deref() == Some(options.user.as_str()) && arg == options.password {
                    state.logged_in = true;
                    reply(&mut writer, "230 Logged in.").await?;
                } else {
                    reply(&mut writer, "530 Login incorrect.").await?;
                }
            }
            "TYPE" => reply(&mut writer, "200 Type set.").await?,
            "SYST" => reply(&mut writer, "215 UNIX Type: L8").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                state.passive = Some(listener);
                let text = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{}).",
                    port >> 8,
                    port & 0xff
                );
                reply(&mut writer, &text).await?;
            }
            "NLST" => {
                let dir = if arg.is_empty() {
                    state.cwd.clone()
                } else {
                    resolve(&state.cwd, &arg)
                };
                let names = {
                    let tree = lock(&tree);
                    tree.dirs.contains(&dir).then(|| tree.children(&dir))
                };
                let Some(names) = names else {
                    reply(&mut writer, "550 No such directory.").await?;
                    continue;
                };
                let Some(mut data) = accept_data(&mut state).await? else {
                    reply(&mut writer, "425 Use PASV first.").await?;
                    continue;
                };

                reply(&mut writer, "150 Here comes the listing.").await?;
                let prefix = arg.trim_end_matches('/');
                let mut listing = String::new();
                for name in names {
                    if prefix.is_empty() {
                        listing.push_str(&format!("{name}\r\n"));
                    } else {
                        listing.push_str(&format!("{prefix}/{name}\r\n"));
                    }
                }
                data.write_all(listing.as_bytes()).await?;
                data.shutdown().await?;
                drop(data);
                reply(&mut writer, "226 Transfer complete.").await?;
            }
            "STOR" => {
                let path = resolve(&state.cwd, &arg);
                if !lock(&tree).dirs.contains(parent(&path)) {
                    reply(&mut writer, "553 Could not create file.").await?;
                    continue;
                }
                let Some(mut data) = accept_data(&mut state).await? else {
                    reply(&mut writer, "425 Use PASV first.").await?;
                    continue;
                };

                reply(&mut writer, "150 Ok to send data.").await?;
                let mut bytes = Vec::new();
                data.read_to_end(&mut bytes).await?;
                drop(data);
                lock(&tree).files.insert(path, bytes);
                reply(&mut writer, "226 Transfer complete.").await?;
            }
            "RETR" => {
                let path = resolve(&state.cwd, &arg);
                let Some(bytes) = lock(&tree).files.get(&path).cloned() else {
                    reply(&mut writer, "550 No such file.").await?;
                    continue;
                };
                let Some(mut data) = accept_data(&mut state).await? else {
                    reply(&mut writer, "425 Use PASV first.").await?;
                    continue;
                };

                reply(&mut writer, "150 Opening BINARY mode data connection.").await?;
                data.write_all(&bytes).await?;
                data.shutdown().await?;
                drop(data);
                reply(&mut writer, "226 Transfer complete.").await?;
            }
            "MKD" => {
                let path = resolve(&state.cwd, &arg);
                let outcome = {
                    let mut tree = lock(&tree);
                    if tree.dirs.contains(&path) || tree.files.contains_key(&path) {
                        Err("550 Directory already exists.")
                    } else if !tree.dirs.contains(parent(&path)) {
                        Err("550 No such parent directory.")
                    } else {
                        tree.dirs.insert(path.clone());
                        Ok(())
                    }
                };
                match outcome {
                    Ok(()) => reply(&mut writer, &format!("257 \"{path}\" created")).await?,
                    Err(text) => reply(&mut writer, text).await?,
                }
            }
            "CWD" => {
                let path = resolve(&state.cwd, &arg);
                if lock(&tree).dirs.contains(&path) {
                    state.cwd = path;
                    reply(&mut writer, "250 Directory successfully changed.").await?;
                } else {
                    reply(&mut writer, "550 Failed to change directory.").await?;
                }
            }
            "PWD" if options.pwd_supported => {
                let text = format!("257 \"{}\" is the current directory", state.cwd);
                reply(&mut writer, &text).await?;
            }
            "QUIT" => {
                reply(&mut writer, "221 Goodbye.").await?;
                break;
            }
            _ => reply(&mut writer, "502 Command not implemented.").await?,
        }
    }
    Ok(())
}

async fn accept_data(state: &mut SessionState) -> Result<Option<TcpStream>> {
    let Some(listener) = state.passive.take() else {
        return Ok(None);
    };
    let (socket, _) = tokio::time::timeout(DATA_ACCEPT_TIMEOUT, listener.accept())
        .await
        .context("client never opened the data connection")??;
    Ok(Some(socket))
}

/// Absolute, normalized form of `arg` relative to `cwd`.
fn resolve(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{cwd}/{arg}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
