use std::path::{self, Path};

/// Returns true when the extension of `path`, leading dot included, is exactly `ext`.
///
/// The extension starts at the last dot of the final component, as written: a trailing
/// separator leaves an empty final component. Leading dots do not start an extension, so
/// `.bashrc` and `..dat` have none, while `a.` has the extension `"."`. A path without
/// an extension only matches the empty `ext`. The comparison is case-sensitive.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    extension_of(path) == ext.as_bytes()
}

fn extension_of(path: &Path) -> &[u8] {
    let bytes = path.as_os_str().as_encoded_bytes();
    let name_start = bytes
        .iter()
        .rposition(|&b| path::is_separator(b as char))
        .map_or(0, |i| i + 1);
    let name = &bytes[name_start..];
    match name.iter().rposition(|&b| b == b'.') {
        Some(dot) if name[..dot].iter().any(|&b| b != b'.') => &name[dot..],
        _ => &[],
    }
}

/// Lazily yields the paths of an iterator whose extension is `ext`.
pub struct WithExtension<'e, I> {
    paths: I,
    ext: &'e str,
}

impl<'e, I> Iterator for WithExtension<'e, I>
where
    I: Iterator,
    I::Item: AsRef<Path>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let ext = self.ext;
        self.paths.find(|path| has_extension(path.as_ref(), ext))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.paths.size_hint().1)
    }
}

pub fn files_with_extension<I>(paths: I, ext: &str) -> WithExtension<'_, I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    WithExtension { paths: paths.into_iter(), ext }
}

/// The `.dat` files of `paths`, in input order.
pub fn dat_files<I>(paths: I) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    files_with_extension(paths, ".dat").collect()
}

/// The `.log` files of `paths`, in input order.
pub fn log_files<I>(paths: I) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    files_with_extension(paths, ".log").collect()
}
