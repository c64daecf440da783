use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

/// How a path registered with a [`Splitter`] gets opened, using the conventional
/// `fopen` style mode strings.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum OpenMode {
    /// `w`: create or truncate.
    #[default]
    Write,
    /// `a`: create if missing and append.
    Append,
    /// `x`: create, failing if the file already exists.
    CreateNew,
    /// `r+`: read and write an existing file.
    Update,
    /// `w+`: create or truncate, readable.
    WriteRead,
    /// `a+`: create if missing and append, readable.
    AppendRead,
}

impl OpenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Write => "w",
            OpenMode::Append => "a",
            OpenMode::CreateNew => "x",
            OpenMode::Update => "r+",
            OpenMode::WriteRead => "w+",
            OpenMode::AppendRead => "a+",
        }
    }

    /// Whether opening keeps the current content of an existing file.
    pub fn preserves_content(&self) -> bool {
        matches!(self, OpenMode::Append | OpenMode::AppendRead | OpenMode::Update)
    }

    pub fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::CreateNew => options.write(true).create_new(true),
            OpenMode::Update => options.read(true).write(true),
            OpenMode::WriteRead => options.read(true).write(true).create(true).truncate(true),
            OpenMode::AppendRead => options.read(true).append(true).create(true),
        };
        options
    }

    pub fn open(&self, path: &Path) -> io::Result<File> {
        self.options().open(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid open mode {0:?}, expected one of w, a, x, r+, w+ or a+")]
pub struct ParseOpenModeError(String);

impl FromStr for OpenMode {
    type Err = ParseOpenModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Binary and text flags make no difference here.
        let mode: String = s.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        match mode.as_str() {
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            "x" => Ok(OpenMode::CreateNew),
            "r+" => Ok(OpenMode::Update),
            "w+" => Ok(OpenMode::WriteRead),
            "a+" => Ok(OpenMode::AppendRead),
            _ => Err(ParseOpenModeError(s.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a [`Splitter`] can write to: either a writer owned by the caller or the
/// path of a file for the splitter to open.
pub enum Destination<'a> {
    Handle(Box<dyn Write + 'a>),
    Path(PathBuf),
}

impl<'a> Destination<'a> {
    pub fn handle(writer: impl Write + 'a) -> Self {
        Destination::Handle(Box::new(writer))
    }
}

impl<'a> From<Box<dyn Write + 'a>> for Destination<'a> {
    fn from(writer: Box<dyn Write + 'a>) -> Self {
        Destination::Handle(writer)
    }
}

impl From<PathBuf> for Destination<'_> {
    fn from(path: PathBuf) -> Self {
        Destination::Path(path)
    }
}

impl From<&Path> for Destination<'_> {
    fn from(path: &Path) -> Self {
        Destination::Path(path.to_path_buf())
    }
}

impl From<String> for Destination<'_> {
    fn from(path: String) -> Self {
        Destination::Path(path.into())
    }
}

impl From<&str> for Destination<'_> {
    fn from(path: &str) -> Self {
        Destination::Path(path.into())
    }
}

impl fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Handle(_) => f.write_str("Handle(..)"),
            Destination::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

struct OpenedFile {
    path: PathBuf,
    file: File,
}

impl OpenedFile {
    /// Flushes and drops the file. Errors from the final `close(2)` are lost, and the file
    /// is not synced since the path may name a pipe or a device.
    fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        debug!("Closed {}", self.path.display());
        Ok(())
    }
}

enum Sink<'a> {
    /// Supplied by the caller, never closed here.
    Borrowed(Box<dyn Write + 'a>),
    /// Opened from a path, closed by [`Splitter::close`].
    Opened(OpenedFile),
}

impl<'a> Sink<'a> {
    fn writer(&mut self) -> &mut (dyn Write + 'a) {
        match self {
            Sink::Borrowed(writer) => writer.as_mut(),
            Sink::Opened(opened) => &mut opened.file,
        }
    }
}

/// An output stream splitter.
///
/// The splitter is itself a [`Write`]r which forwards every write to each registered
/// destination, in registration order. Destinations given as paths are opened by the
/// splitter and closed again by [`Splitter::close`]. Writers supplied by the caller are
/// never closed, so a splitter can stand in for `stderr` while also logging to a file:
///
/// ```
/// use std::io::{self, Write};
/// use script_output::{Destination, Splitter};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("run.log");
/// let mut echo = Vec::new();
///
/// let mut stream = Splitter::open([Destination::handle(&mut echo), path.as_path().into()])?;
/// writeln!(stream, "Logged message")?;
/// assert_eq!(stream.len(), 2);
/// stream.close()?;
/// drop(stream);
///
/// assert_eq!(echo, b"Logged message\n");
/// assert_eq!(std::fs::read_to_string(&path)?, "Logged message\n");
/// # Ok::<(), io::Error>(())
/// ```
///
/// There is no buffering and no atomicity across destinations: when one of them fails
/// the earlier ones have already received the data, the later ones have not, and the
/// error is returned as is.
#[derive(Default)]
pub struct Splitter<'a> {
    sinks: Vec<Sink<'a>>,
}

impl<'a> Splitter<'a> {
    pub fn new() -> Self {
        Splitter { sinks: Vec::new() }
    }

    /// Creates a splitter and registers every destination, opening paths for writing.
    ///
    /// The first open error is returned. Files opened before it are closed again.
    pub fn open<I>(destinations: I) -> io::Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Destination<'a>>,
    {
        let mut splitter = Splitter::new();
        for destination in destinations {
            splitter.register(destination)?;
        }
        Ok(splitter)
    }

    /// Registers a destination, opening paths with [`OpenMode::Write`].
    pub fn register(&mut self, destination: impl Into<Destination<'a>>) -> io::Result<()> {
        self.register_with_mode(destination, OpenMode::Write)
    }

    /// Registers a destination. Handles are added as they are, paths are opened with
    /// `mode` and owned by the splitter from then on. The same handle registered twice
    /// receives every write twice.
    pub fn register_with_mode(
        &mut self,
        destination: impl Into<Destination<'a>>,
        mode: OpenMode,
    ) -> io::Result<()> {
        match destination.into() {
            Destination::Handle(writer) => {
                self.sinks.push(Sink::Borrowed(writer));
                debug!("Registered a stream, {} destination(s)", self.sinks.len());
            }
            Destination::Path(path) => {
                let file = mode.open(&path)?;
                debug!("Opened {} with mode {mode}", path.display());
                self.sinks.push(Sink::Opened(OpenedFile { path, file }));
            }
        }
        Ok(())
    }

    /// Number of registered destinations, whoever owns them.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Paths of the files this splitter opened itself, in registration order.
    pub fn opened_paths(&self) -> impl Iterator<Item = &Path> {
        self.sinks.iter().filter_map(|sink| match sink {
            Sink::Opened(opened) => Some(opened.path.as_path()),
            Sink::Borrowed(_) => None,
        })
    }

    /// Closes the files opened by this splitter and forgets every destination.
    ///
    /// Caller supplied writers are only released. All sinks are released even when
    /// flushing one of the files fails, the first such error is returned. Closing an
    /// empty splitter does nothing.
    pub fn close(&mut self) -> io::Result<()> {
        let mut result = Ok(());
        for sink in self.sinks.drain(..) {
            if let Sink::Opened(opened) = sink {
                let closed = opened.close();
                if result.is_ok() {
                    result = closed;
                }
            }
        }
        result
    }

    /// Runs `body` with the splitter and closes it afterwards, whichever way `body`
    /// exits, panics included.
    ///
    /// An error returned by `body` is passed through untouched. A failure to close is
    /// only reported when `body` succeeded.
    pub fn scope<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<io::Error>,
    {
        let mut guard = CloseGuard { splitter: self, armed: true };
        let outcome = body(&mut *guard.splitter);
        guard.armed = false;
        let closed = guard.splitter.close();
        match outcome {
            Ok(value) => {
                closed?;
                Ok(value)
            }
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!("Failed to close splitter after an error: {close_err}");
                }
                Err(err)
            }
        }
    }
}

impl Write for Splitter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            forward(sink.writer(), buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|sink| sink.writer().flush())
    }
}

impl Drop for Splitter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close splitter: {e}");
        }
    }
}

impl fmt::Debug for Splitter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("destinations", &self.len())
            .field("opened", &self.opened_paths().collect::<Vec<_>>())
            .finish()
    }
}

/// Hands `buf` to `writer` in a single `write` call, topping up with `write_all` when
/// only part of it was accepted.
///
/// An interrupted call is retried on the same writer: callers never see `Interrupted`
/// once earlier writers have taken `buf`.
fn forward(writer: &mut dyn Write, buf: &[u8]) -> io::Result<()> {
    let written = loop {
        match writer.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => break result?,
        }
    };
    if written < buf.len() {
        writer.write_all(&buf[written..])?;
    }
    Ok(())
}

struct CloseGuard<'s, 'a> {
    splitter: &'s mut Splitter<'a>,
    armed: bool,
}

impl Drop for CloseGuard<'_, '_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.splitter.close() {
                warn!("Failed to close splitter while unwinding: {e}");
            }
        }
    }
}
