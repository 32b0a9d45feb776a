use std::fs;
use std::io;
use std::io::prelude::*;
use std::path;

use crate::pipeline::FeatureFit;
use crate::spectrum::Spectrum;

/// Write the pixel, original, best fit and corrected columns as tab separated text
pub fn to_file<P: AsRef<path::Path>>(spectrum: &Spectrum, fit: &FeatureFit, path: P) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    write_columns(spectrum, fit, &mut writer)?;
    writer.flush()
}

pub fn write_columns<W: Write>(spectrum: &Spectrum, fit: &FeatureFit, writer: &mut W) -> io::Result<()> {
    writer.write_all(b"# pixel\toriginal\tbestfit\tcorrected\n")?;
    let rows = spectrum
        .values()
        .iter()
        .zip(fit.best_fit.iter())
        .zip(fit.corrected.iter())
        .enumerate();
    for (i, ((y, best), corrected)) in rows {
        writeln!(writer, "{i}\t{y}\t{best}\t{corrected}")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::container::{SpectralContainer, TextContainer};
    use crate::params::{LineParams, Profile};
    use crate::spectrum::Region;

    fn fit() -> (Spectrum, FeatureFit) {
        let spectrum = Spectrum::new(vec![5.0, 4.0, 5.0]);
        let fit = FeatureFit {
            profile: Profile::Lorentz,
            region: Region::new(0, 3, 3).unwrap(),
            params: LineParams::default(),
            stages: Vec::new(),
            best_fit: vec![5.0, 4.5, 5.0],
            corrected: vec![5.0, 4.5, 5.0],
        };
        (spectrum, fit)
    }

    #[test]
    fn test_columns() {
        let (spectrum, fit) = fit();
        let mut buffer = Vec::new();
        write_columns(&spectrum, &fit, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1\t4\t4.5\t4.5");
    }

    #[test]
    fn test_dump_reads_back_as_corrected() -> Result<(), Box<dyn std::error::Error>> {
        let (spectrum, fit) = fit();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dump.txt");
        to_file(&spectrum, &fit, &path)?;
        let reread = TextContainer::new(&path).read_spectrum("SCI")?;
        assert_eq!(reread.values(), fit.corrected.as_slice());
        Ok(())
    }
}
