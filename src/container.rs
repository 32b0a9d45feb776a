//! Reading spectra from, and writing corrected spectra into, data containers.
//!
//! A container holds one or more named extensions, each with one data
//! array. [`SpectralContainer::write_corrected`] produces a *copy* of the
//! source container with one extension's data replaced; the source is never
//! modified.
//!
//! Writes are all-or-nothing: the copy is assembled in a temporary file next
//! to the destination and only moved into place once complete. An existing
//! destination is never overwritten.
use std::collections::HashMap;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use cfg_if::cfg_if;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::spectrum::Spectrum;

/// The extension the spectrum is read from unless told otherwise
pub const DEFAULT_EXTENSION: &str = "SCI";

/// All the ways reading or writing a container can fail
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Extension {name:?} was not found in {path}")]
    MissingExtension { name: String, path: String },
    #[error("Extension {name:?} holds an array of shape {shape:?}, expected a 1-D spectrum")]
    NotOneDimensional { name: String, shape: Vec<usize> },
    #[error("Could not parse line {line} of {path}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} containers are not supported by this build")]
    Unsupported(String),
    #[cfg(feature = "fits")]
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A source of a 1-D spectrum that can also write a corrected copy of itself
pub trait SpectralContainer {
    /// Read the data array of `extension` as a spectrum
    fn read_spectrum(&self, extension: &str) -> Result<Spectrum, ContainerError>;

    /// Write a copy of this container to `destination`, with the data array of
    /// `extension` replaced by `data`
    fn write_corrected(
        &mut self,
        extension: &str,
        data: &[f64],
        destination: &Path,
    ) -> Result<(), ContainerError>;

    /// Describe where this container's data came from, for messages
    fn describe(&self) -> String;

    /// Fail early if [`SpectralContainer::write_corrected`] can never succeed
    /// for `destination`
    fn check_writable(&self, _destination: &Path) -> Result<(), ContainerError> {
        Ok(())
    }
}

/// Build a `NamedTempFile` next to `destination`, let `fill` populate it, then
/// move it into place without clobbering an existing file. On any failure
/// nothing is left at `destination`.
pub(crate) fn write_atomically<F>(destination: &Path, fill: F) -> Result<(), ContainerError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), ContainerError>,
{
    let failure = |source: io::Error| ContainerError::WriteFailure {
        path: destination.to_path_buf(),
        source,
    };
    if destination.exists() {
        return Err(failure(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "the destination already exists",
        )));
    }
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staging = NamedTempFile::new_in(&directory).map_err(failure)?;
    fill(&mut staging)?;
    staging.as_file().sync_all().map_err(failure)?;
    staging
        .persist_noclobber(destination)
        .map_err(|err| failure(err.error))?;
    log::debug!("Wrote {}", destination.display());
    Ok(())
}

/// Named in-memory extensions, recording every copy written from them.
#[derive(Debug, Default, Clone)]
pub struct MemoryContainer {
    pub extensions: HashMap<String, Vec<f64>>,
    pub written: HashMap<PathBuf, HashMap<String, Vec<f64>>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, name: impl Into<String>, data: Vec<f64>) -> Self {
        self.extensions.insert(name.into(), data);
        self
    }
}

impl SpectralContainer for MemoryContainer {
    fn read_spectrum(&self, extension: &str) -> Result<Spectrum, ContainerError> {
        self.extensions
            .get(extension)
            .map(|data| Spectrum::new(data.clone()))
            .ok_or_else(|| ContainerError::MissingExtension {
                name: extension.to_string(),
                path: self.describe(),
            })
    }

    fn write_corrected(
        &mut self,
        extension: &str,
        data: &[f64],
        destination: &Path,
    ) -> Result<(), ContainerError> {
        if !self.extensions.contains_key(extension) {
            return Err(ContainerError::MissingExtension {
                name: extension.to_string(),
                path: self.describe(),
            });
        }
        if self.written.contains_key(destination) {
            return Err(ContainerError::WriteFailure {
                path: destination.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "the destination already exists"),
            });
        }
        let mut copy = self.extensions.clone();
        copy.insert(extension.to_string(), data.to_vec());
        self.written.insert(destination.to_path_buf(), copy);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Whitespace separated text columns, one sample per line, the last column
/// holding the counts. `#` starts a comment.
///
/// A text file holds a single unnamed array, so the extension name is not
/// consulted.
#[derive(Debug, Clone)]
pub struct TextContainer {
    pub path: PathBuf,
}

impl TextContainer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn parse<R: BufRead>(reader: R, path: &str) -> Result<Vec<f64>, ContainerError> {
        let mut values = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            let token = content.split_whitespace().last().unwrap_or_default();
            let value = token.parse::<f64>().map_err(|err| ContainerError::Parse {
                path: path.to_string(),
                line: i + 1,
                message: format!("{token:?}: {err}"),
            })?;
            values.push(value);
        }
        Ok(values)
    }
}

impl SpectralContainer for TextContainer {
    fn read_spectrum(&self, extension: &str) -> Result<Spectrum, ContainerError> {
        log::debug!(
            "Reading {} as text, extension {extension:?} is implied",
            self.path.display()
        );
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let values = Self::parse(reader, &self.describe())?;
        Ok(Spectrum::new(values))
    }

    fn write_corrected(
        &mut self,
        _extension: &str,
        data: &[f64],
        destination: &Path,
    ) -> Result<(), ContainerError> {
        write_atomically(destination, |staging| {
            let mut writer = io::BufWriter::new(staging.as_file_mut());
            for (i, value) in data.iter().enumerate() {
                writeln!(writer, "{i}\t{value}").map_err(|source| ContainerError::WriteFailure {
                    path: destination.to_path_buf(),
                    source,
                })?;
            }
            writer.flush().map_err(|source| ContainerError::WriteFailure {
                path: destination.to_path_buf(),
                source,
            })
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(feature = "fits")]
mod fits {
    use std::path::{Path, PathBuf};

    use fitsio::hdu::{FitsHdu, HduInfo};
    use fitsio::FitsFile;

    use super::{is_gzipped, write_atomically, ContainerError, SpectralContainer};
    use crate::spectrum::Spectrum;

    /// A FITS file whose image extensions hold spectra
    #[derive(Debug, Clone)]
    pub struct FitsContainer {
        pub path: PathBuf,
    }

    impl FitsContainer {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        /// Purely numeric names address an HDU by index, anything else by `EXTNAME`
        fn locate(fits: &mut FitsFile, extension: &str, path: &Path) -> Result<FitsHdu, ContainerError> {
            let found = match extension.parse::<usize>() {
                Ok(index) => fits.hdu(index),
                Err(_) => fits.hdu(extension),
            };
            found.map_err(|err| {
                log::debug!("HDU lookup for {extension:?} failed: {err}");
                ContainerError::MissingExtension {
                    name: extension.to_string(),
                    path: path.display().to_string(),
                }
            })
        }

        fn check_shape(hdu: &FitsHdu, extension: &str) -> Result<(), ContainerError> {
            match &hdu.info {
                HduInfo::ImageInfo { shape, .. } => {
                    let longest = shape.iter().copied().max().unwrap_or_default();
                    let total: usize = shape.iter().product();
                    if shape.is_empty() || total != longest {
                        Err(ContainerError::NotOneDimensional {
                            name: extension.to_string(),
                            shape: shape.clone(),
                        })
                    } else {
                        Ok(())
                    }
                }
                _ => Err(ContainerError::NotOneDimensional {
                    name: extension.to_string(),
                    shape: Vec::new(),
                }),
            }
        }
    }

    impl SpectralContainer for FitsContainer {
        fn read_spectrum(&self, extension: &str) -> Result<Spectrum, ContainerError> {
            let mut fits = FitsFile::open(&self.path)?;
            let hdu = Self::locate(&mut fits, extension, &self.path)?;
            Self::check_shape(&hdu, extension)?;
            let values: Vec<f64> = hdu.read_image(&mut fits)?;
            log::debug!(
                "Read {} samples from {}[{extension}]",
                values.len(),
                self.path.display()
            );
            Ok(Spectrum::new(values))
        }

        fn write_corrected(
            &mut self,
            extension: &str,
            data: &[f64],
            destination: &Path,
        ) -> Result<(), ContainerError> {
            self.check_writable(destination)?;
            let source = self.path.clone();
            write_atomically(destination, |staging| {
                let failure = |err: std::io::Error| ContainerError::WriteFailure {
                    path: destination.to_path_buf(),
                    source: err,
                };
                std::fs::copy(&source, staging.path()).map_err(failure)?;
                let mut fits = FitsFile::edit(staging.path())?;
                let hdu = Self::locate(&mut fits, extension, &source)?;
                Self::check_shape(&hdu, extension)?;
                hdu.write_image(&mut fits, data)?;
                // closing flushes cfitsio's buffers into the staging file
                drop(fits);
                Ok(())
            })
        }

        fn describe(&self) -> String {
            self.path.display().to_string()
        }

        /// cfitsio only opens compressed files read-only
        fn check_writable(&self, destination: &Path) -> Result<(), ContainerError> {
            match [self.path.as_path(), destination].into_iter().find(|p| is_gzipped(p)) {
                Some(path) => Err(ContainerError::Unsupported(format!(
                    "Writing compressed FITS ({})",
                    path.display()
                ))),
                None => Ok(()),
            }
        }
    }
}

#[cfg(feature = "fits")]
pub use fits::FitsContainer;

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Whether `path` names a FITS file, by extension
pub fn is_fits_path(path: &Path) -> bool {
    let inner = if is_gzipped(path) {
        path.file_stem().map(Path::new)
    } else {
        Some(path)
    };
    inner
        .and_then(Path::extension)
        .is_some_and(|ext| ["fits", "fit", "fts"].iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Pick the container implementation for `path`
pub fn open_container(path: &Path) -> Result<Box<dyn SpectralContainer>, ContainerError> {
    if !is_fits_path(path) {
        return Ok(Box::new(TextContainer::new(path)));
    }
    cfg_if! {
        if #[cfg(feature = "fits")] {
            return Ok(Box::new(FitsContainer::new(path)));
        } else {
            return Err(ContainerError::Unsupported(format!(
                "FITS ({}, rebuild with the `fits` feature)",
                path.display()
            )));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_memory_missing_extension() {
        let container = MemoryContainer::new().with_extension("SCI", vec![1.0, 2.0]);
        assert_eq!(container.read_spectrum("SCI").unwrap().len(), 2);
        match container.read_spectrum("VAR") {
            Err(ContainerError::MissingExtension { name, .. }) => assert_eq!(name, "VAR"),
            other => panic!("Expected a missing extension, got {other:?}"),
        }
    }

    #[test]
    fn test_memory_write_is_a_copy() {
        let mut container = MemoryContainer::new()
            .with_extension("SCI", vec![1.0, 2.0])
            .with_extension("VAR", vec![0.1, 0.1]);
        let out = Path::new("out.fits");
        container.write_corrected("SCI", &[0.5, 1.5], out).unwrap();
        assert_eq!(container.extensions["SCI"], vec![1.0, 2.0]);
        assert_eq!(container.written[out]["SCI"], vec![0.5, 1.5]);
        assert_eq!(container.written[out]["VAR"], vec![0.1, 0.1]);
        assert!(container.write_corrected("SCI", &[0.0, 0.0], out).is_err());
    }

    #[test]
    fn test_text_parse() {
        let text = "# pixel counts\n0 1.5\n1\t2.5 # note\n\n2 -3e1\n";
        let values = TextContainer::parse(io::Cursor::new(text), "inline").unwrap();
        assert_eq!(values, vec![1.5, 2.5, -30.0]);

        let single = TextContainer::parse(io::Cursor::new("4\n5\n"), "inline").unwrap();
        assert_eq!(single, vec![4.0, 5.0]);

        match TextContainer::parse(io::Cursor::new("0 1\n1 abc\n"), "inline") {
            Err(ContainerError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected a parse failure, got {other:?}"),
        }
    }

    #[test]
    fn test_text_round_trip_and_no_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        fs::write(&source, "0 10\n1 11\n2 12\n").unwrap();

        let mut container = TextContainer::new(&source);
        let spectrum = container.read_spectrum(DEFAULT_EXTENSION).unwrap();
        assert_eq!(spectrum.values(), &[10.0, 11.0, 12.0]);

        let out = dir.path().join("out.txt");
        container.write_corrected(DEFAULT_EXTENSION, &[1.0, 2.0, 3.0], &out).unwrap();
        let reread = TextContainer::new(&out).read_spectrum(DEFAULT_EXTENSION).unwrap();
        assert_eq!(reread.values(), &[1.0, 2.0, 3.0]);

        let err = container
            .write_corrected(DEFAULT_EXTENSION, &[9.0, 9.0, 9.0], &out)
            .unwrap_err();
        assert!(matches!(err, ContainerError::WriteFailure { .. }), "{err}");
        let unchanged = TextContainer::new(&out).read_spectrum(DEFAULT_EXTENSION).unwrap();
        assert_eq!(unchanged.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_unwritable_destination_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        fs::write(&source, "1\n2\n").unwrap();
        let out = dir.path().join("missing").join("out.txt");

        let mut container = TextContainer::new(&source);
        let err = container
            .write_corrected(DEFAULT_EXTENSION, &[1.0, 2.0], &out)
            .unwrap_err();
        assert!(matches!(err, ContainerError::WriteFailure { .. }), "{err}");
        assert!(!out.exists());
    }

    #[test]
    fn test_fits_detection() {
        assert!(is_fits_path(Path::new("N20100101S0001.fits")));
        assert!(is_fits_path(Path::new("data/target.FIT")));
        assert!(is_fits_path(Path::new("target.fits.gz")));
        assert!(!is_fits_path(Path::new("target.txt")));
        assert!(open_container(Path::new("target.dat")).is_ok());
    }
}
