//! Helpers for scripts that send their output to several places.
//!
//! - [`Splitter`] is a writer that forwards everything it receives to a list of
//!   destinations, for example `stderr` plus a log file.
//! - [`WriteCount`] is a writer that counts write calls, which is handy to poll the
//!   progress of a producer from another thread.
//! - [`extension`] picks path names by their file extension.
//!
//! ```
//! use std::io::Write;
//! use script_output::{extension, Destination, Splitter, WriteCount};
//!
//! let args = ["a.dat", "b.log", "c.dat", "d.txt"];
//! assert_eq!(extension::dat_files(args), ["a.dat", "c.dat"]);
//! assert_eq!(extension::log_files(args), ["b.log"]);
//!
//! let counter = WriteCount::new();
//! let mut output = Splitter::new();
//! output.register(Destination::handle(std::io::sink()))?;
//! output.register(Destination::handle(&counter))?;
//! for line in ["first\n", "second\n"] {
//!     output.write_all(line.as_bytes())?;
//! }
//! assert_eq!(counter.tell(), 2);
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod extension;
pub mod splitter;
pub mod write_count;

pub use splitter::{Destination, OpenMode, ParseOpenModeError, Splitter};
pub use write_count::WriteCount;
