//! In-memory remote tree for driving the engine without an SSH server.
//!
//! Every channel call is appended to a shared log so tests can assert on the
//! exact order of remote operations.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use engine::{ExecChannel, ExecOutput, RemoteStat, Session, TransferChannel, TransportError};

/// Modification time reported for every remote file.
pub const REMOTE_MTIME: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
    /// Symlink holding an absolute target path
    Link(String),
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    calls: Vec<String>,
    /// (call prefix, path) that fails with a session error
    failure: Option<(String, String)>,
    /// Path whose stat comes back without mode bits
    modeless: Option<String>,
    /// Flip the first byte of every written file
    corrupt_writes: bool,
    transfer_unavailable: bool,
    exec_output: Option<ExecOutput>,
    executed: Vec<String>,
}

/// A fake remote host. Clones share the same tree.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Rc<RefCell<State>>,
}

fn sftp_failure() -> TransportError {
    TransportError::Sftp {
        code: 4,
        message: "Failure".to_string(),
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(dirs: &[&str]) -> Self {
        let remote = Self::new();
        for dir in dirs {
            remote.put_dir(dir);
        }
        remote
    }

    pub fn put_dir(&self, path: &str) {
        self.state.borrow_mut().nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.state
            .borrow_mut()
            .nodes
            .insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn put_link(&self, path: &str, target: &str) {
        self.state
            .borrow_mut()
            .nodes
            .insert(path.to_string(), Node::Link(target.to_string()));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.borrow().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.borrow().nodes.get(path), Some(Node::Dir))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.borrow().nodes.contains_key(path)
    }

    /// Every call so far, formatted as `"<op> <path>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Calls that change the tree (mkdir, write, remove, rmdir).
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["mkdir ", "write ", "remove ", "rmdir "]
                    .iter()
                    .any(|op| c.starts_with(op))
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Make the next `op` call on `path` fail with a session error.
    pub fn fail_on(&self, op: &str, path: &str) {
        self.state.borrow_mut().failure = Some((op.to_string(), path.to_string()));
    }

    pub fn hide_mode(&self, path: &str) {
        self.state.borrow_mut().modeless = Some(path.to_string());
    }

    pub fn corrupt_writes(&self) {
        self.state.borrow_mut().corrupt_writes = true;
    }

    pub fn refuse_transfer_channel(&self) {
        self.state.borrow_mut().transfer_unavailable = true;
    }

    pub fn set_exec_output(&self, output: ExecOutput) {
        self.state.borrow_mut().exec_output = Some(output);
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.borrow().executed.clone()
    }

    fn record(&self, op: &str, path: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("{} {}", op, path));

        let hit = matches!(&state.failure, Some((f_op, f_path)) if f_op == op && f_path == path);
        if hit {
            state.failure = None;
            return Err(TransportError::Session {
                code: -7,
                message: "unable to send FXP packet".to_string(),
            });
        }
        Ok(())
    }

    /// Follow links in every component except the last.
    fn resolve_parents(&self, path: &str) -> String {
        let state = self.state.borrow();
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let mut resolved = String::new();
        for (index, component) in components.iter().enumerate() {
            resolved = format!("{}/{}", resolved, component);
            if index + 1 == components.len() {
                break;
            }
            for _ in 0..8 {
                match state.nodes.get(&resolved) {
                    Some(Node::Link(target)) => resolved = target.clone(),
                    _ => break,
                }
            }
        }
        resolved
    }

    /// Follow links in every component, as a server-side stat would.
    fn resolve(&self, path: &str) -> Option<(String, Node)> {
        let mut current = self.resolve_parents(path);
        let state = self.state.borrow();
        for _ in 0..8 {
            match state.nodes.get(&current) {
                Some(Node::Link(target)) => current = target.clone(),
                Some(node) => return Some((current, node.clone())),
                None => return None,
            }
        }
        None
    }

    fn parent_is_dir(&self, path: &str) -> bool {
        let parent = parent_of(path);
        parent.is_empty() || parent == "/" || self.is_dir(parent)
    }
}

pub struct MemoryChannel {
    remote: MemoryRemote,
}

pub struct MemoryExec {
    remote: MemoryRemote,
}

impl Session for MemoryRemote {
    type Transfer = MemoryChannel;
    type Exec = MemoryExec;

    fn open_transfer_channel(&self) -> Result<MemoryChannel, TransportError> {
        if self.state.borrow().transfer_unavailable {
            return Err(TransportError::Session {
                code: -31,
                message: "subsystem request failed".to_string(),
            });
        }
        Ok(MemoryChannel {
            remote: self.clone(),
        })
    }

    fn open_exec_channel(&self) -> Result<MemoryExec, TransportError> {
        if self.state.borrow().exec_output.is_none() {
            return Err(TransportError::Session {
                code: -21,
                message: "channel open failure".to_string(),
            });
        }
        Ok(MemoryExec {
            remote: self.clone(),
        })
    }
}

impl TransferChannel for MemoryChannel {
    fn stat(&mut self, path: &str) -> Result<RemoteStat, TransportError> {
        self.remote.record("stat", path)?;
        if self.remote.state.borrow().modeless.as_deref() == Some(path) {
            return Ok(RemoteStat::default());
        }
        match self.remote.resolve(path) {
            Some((_, node)) => Ok(stat_of(&node)),
            None => Err(TransportError::NotFound),
        }
    }

    fn lstat(&mut self, path: &str) -> Result<RemoteStat, TransportError> {
        self.remote.record("lstat", path)?;
        let resolved = self.remote.resolve_parents(path);
        let state = self.remote.state.borrow();
        if state.modeless.as_deref() == Some(path) {
            return Ok(RemoteStat::default());
        }
        match state.nodes.get(&resolved) {
            Some(node) => Ok(stat_of(node)),
            None => Err(TransportError::NotFound),
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<String>, TransportError> {
        self.remote.record("list", path)?;
        let dir = match self.remote.resolve(path) {
            Some((dir, Node::Dir)) => dir,
            _ => return Err(TransportError::NotFound),
        };
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let state = self.remote.state.borrow();
        let names = state
            .nodes
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    fn read(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        self.remote.record("read", path)?;
        let data = match self.remote.resolve(path) {
            Some((_, Node::File(data))) => data,
            Some(_) => return Err(sftp_failure()),
            None => return Err(TransportError::NotFound),
        };
        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    fn write(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, TransportError> {
        self.remote.record("write", path)?;
        if !self.remote.parent_is_dir(path) {
            return Err(TransportError::NotFound);
        }
        if self.remote.is_dir(path) {
            return Err(sftp_failure());
        }
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let len = data.len() as u64;
        if self.remote.state.borrow().corrupt_writes {
            if let Some(first) = data.first_mut() {
                *first ^= 0xff;
            }
        }
        self.remote.put_file(path, &data);
        Ok(len)
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.remote.record("mkdir", path)?;
        if self.remote.exists(path) {
            return Err(sftp_failure());
        }
        if !self.remote.parent_is_dir(path) {
            return Err(TransportError::NotFound);
        }
        self.remote.put_dir(path);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), TransportError> {
        self.remote.record("remove", path)?;
        let mut state = self.remote.state.borrow_mut();
        let node = state.nodes.get(path).cloned();
        match node {
            Some(Node::File(_)) | Some(Node::Link(_)) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(sftp_failure()),
            None => Err(TransportError::NotFound),
        }
    }

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.remote.record("rmdir", path)?;
        if !self.remote.is_dir(path) {
            return Err(TransportError::NotFound);
        }
        let prefix = format!("{}/", path);
        let mut state = self.remote.state.borrow_mut();
        if state.nodes.keys().any(|key| key.starts_with(&prefix)) {
            // Directory not empty
            return Err(sftp_failure());
        }
        state.nodes.remove(path);
        Ok(())
    }
}

fn stat_of(node: &Node) -> RemoteStat {
    match node {
        Node::File(data) => RemoteStat {
            perm: Some(0o100644),
            size: Some(data.len() as u64),
            mtime: Some(REMOTE_MTIME),
        },
        Node::Dir => RemoteStat {
            perm: Some(0o040755),
            size: Some(4096),
            mtime: Some(REMOTE_MTIME),
        },
        Node::Link(target) => RemoteStat {
            perm: Some(0o120777),
            size: Some(target.len() as u64),
            mtime: Some(REMOTE_MTIME),
        },
    }
}

impl ExecChannel for MemoryExec {
    fn request_pty(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<ExecOutput, TransportError> {
        let mut state = self.remote.state.borrow_mut();
        state.executed.push(command.to_string());
        Ok(state.exec_output.clone().unwrap_or_default())
    }
}

/// Collect every regular file under `root` as relative path -> contents.
pub fn read_local_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(dir: &Path, prefix: &str, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).expect("Failed to read dir") {
            let entry = entry.expect("Failed to read entry");
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let path = entry.path();
            if path.is_dir() {
                walk(&path, &rel, out);
            } else {
                out.insert(rel, fs::read(&path).expect("Failed to read file"));
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, "", &mut out);
    out
}

/// Create files (and their parent directories) under `root`.
pub fn write_local_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, data) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(&path, data).expect("Failed to write file");
    }
}
