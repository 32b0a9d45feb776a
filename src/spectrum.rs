//! One-dimensional spectra and the pixel intervals selected from them.
use std::borrow::Cow;
use std::fmt;
use std::iter::FusedIterator;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

use crate::arrayops;

/// All the ways a pixel interval can be rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("Invalid region [{start}, {end}): bounds must satisfy 0 <= left < right <= {len} and span at least 2 pixels")]
    InvalidRegion { start: i64, end: i64, len: usize },
}

/// A half-open `[start, end)` interval of pixel positions which is known
/// to lie within a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    /// Validate user supplied bounds against a spectrum of `len` pixels.
    ///
    /// Bounds are never clipped: anything outside `0 <= start < end <= len`,
    /// or narrower than two pixels, is an error.
    pub fn new(start: i64, end: i64, len: usize) -> Result<Self, RegionError> {
        let invalid = RegionError::InvalidRegion { start, end, len };
        if start < 0 || end <= start || end - start < 2 {
            return Err(invalid);
        }
        match (usize::try_from(start), usize::try_from(end)) {
            (Ok(s), Ok(e)) if e <= len => Ok(Self { start: s, end: e }),
            _ => Err(invalid),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} , {}", self.start, self.end)
    }
}

/// Counts indexed by integer pixel position `0..N`
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    values: Vec<f64>,
}

impl Spectrum {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }

    /// The pixel axis `0..N` as floating point coordinates
    pub fn pixels(&self) -> Vec<f64> {
        arrayops::arange(0, self.len())
    }

    /// Validate `[start, end)` and borrow the paired pixel/value sub-arrays for it
    pub fn select(&self, start: i64, end: i64) -> Result<SubSpectrum<'_>, RegionError> {
        let region = Region::new(start, end, self.len())?;
        self.region(&region)
    }

    /// Extract the sub-spectrum covering `region`.
    ///
    /// `region` is checked again against this spectrum's length, a region
    /// validated for a longer spectrum is an error rather than clipped.
    pub fn region(&self, region: &Region) -> Result<SubSpectrum<'_>, RegionError> {
        let Region { start, end } = *region;
        if end > self.len() || end < start || end - start < 2 {
            return Err(RegionError::InvalidRegion {
                start: i64::try_from(start).unwrap_or(i64::MAX),
                end: i64::try_from(end).unwrap_or(i64::MAX),
                len: self.len(),
            });
        }
        Ok(SubSpectrum::new(
            Cow::Owned(arrayops::arange(start, end)),
            Cow::Borrowed(&self.values[start..end]),
        ))
    }
}

impl From<Vec<f64>> for Spectrum {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<&[f64]> for Spectrum {
    fn from(values: &[f64]) -> Self {
        Self::new(values.to_vec())
    }
}

/// Paired pixel positions and values around a feature
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubSpectrum<'a> {
    pub pixel: Cow<'a, [f64]>,
    pub value: Cow<'a, [f64]>,
}

impl<'a> SubSpectrum<'a> {
    pub fn new(pixel: Cow<'a, [f64]>, value: Cow<'a, [f64]>) -> Self {
        assert_eq!(
            pixel.len(),
            value.len(),
            "pixel array length ({}) must equal value array length ({})",
            pixel.len(),
            value.len()
        );
        Self { pixel, value }
    }

    pub fn len(&self) -> usize {
        self.pixel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel.is_empty()
    }

    pub fn first(&self) -> Option<(f64, f64)> {
        self.get(0)
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn get(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.pixel.get(index)?, *self.value.get(index)?))
    }

    /// The index of the deepest point of the sub-spectrum
    pub fn argmin(&self) -> Option<usize> {
        arrayops::argmin(&self.value)
    }

    pub fn iter(&self) -> SubSpectrumIter<'_> {
        SubSpectrumIter {
            inner: self.pixel.iter().copied().zip(self.value.iter().copied()),
        }
    }

    pub fn borrow(&self) -> SubSpectrum<'_> {
        SubSpectrum::new(
            Cow::Borrowed(self.pixel.as_ref()),
            Cow::Borrowed(self.value.as_ref()),
        )
    }
}

impl From<(Vec<f64>, Vec<f64>)> for SubSpectrum<'static> {
    fn from((pixel, value): (Vec<f64>, Vec<f64>)) -> Self {
        Self::new(Cow::Owned(pixel), Cow::Owned(value))
    }
}

pub struct SubSpectrumIter<'a> {
    inner: std::iter::Zip<
        std::iter::Copied<std::slice::Iter<'a, f64>>,
        std::iter::Copied<std::slice::Iter<'a, f64>>,
    >,
}

impl Iterator for SubSpectrumIter<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl FusedIterator for SubSpectrumIter<'_> {}

impl ExactSizeIterator for SubSpectrumIter<'_> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ramp(n: usize) -> Spectrum {
        Spectrum::new((0..n).map(|i| i as f64 * 2.0).collect())
    }

    #[test]
    fn test_region_extraction() {
        let spectrum = ramp(10);
        let sub = spectrum.select(3, 7).unwrap();
        assert_eq!(sub.pixel.as_ref(), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sub.value.as_ref(), &[6.0, 8.0, 10.0, 12.0]);
        assert_eq!(sub.first(), Some((3.0, 6.0)));
        assert_eq!(sub.last(), Some((6.0, 12.0)));
    }

    #[test]
    fn test_full_range_is_valid() {
        let spectrum = ramp(10);
        let sub = spectrum.select(0, 10).unwrap();
        assert_eq!(sub.len(), 10);
    }

    #[rstest::rstest]
    #[case(4, 4)]
    #[case(5, 2)]
    #[case(-1, 5)]
    #[case(3, 11)]
    #[case(4, 5)]
    fn test_invalid_regions_are_rejected(#[case] start: i64, #[case] end: i64) {
        let spectrum = ramp(10);
        let err = spectrum.select(start, end).unwrap_err();
        assert_eq!(err, RegionError::InvalidRegion { start, end, len: 10 });
    }

    #[test]
    fn test_region_from_longer_spectrum_is_rejected() {
        let region = Region::new(3, 9, 20).unwrap();
        let err = ramp(6).region(&region).unwrap_err();
        assert_eq!(err, RegionError::InvalidRegion { start: 3, end: 9, len: 6 });

        let past_end = Region::new(12, 15, 20).unwrap();
        assert!(ramp(6).region(&past_end).is_err());
        assert_eq!(ramp(9).region(&region).unwrap().len(), 6);
    }

    #[test]
    fn test_region_display() {
        let region = Region::new(120, 180, 500).unwrap();
        assert_eq!(region.to_string(), "120 , 180");
        assert_eq!(region.len(), 60);
    }
}
