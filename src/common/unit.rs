//! Unit conversion utilities.
//!
//! Both hangul document formats measure linear distances in HWPUNIT, a
//! fixed-point unit of 1/7200 inch. Character heights use the same base value
//! scaled by 100 ("height-hundredths"): a height of 1000 equals 10 pt.

/// HWPUNITs per inch.
pub const HWPUNITS_PER_INCH: i64 = 7_200;
/// HWPUNITs per point (1/72 inch).
pub const HWPUNITS_PER_PT: i64 = 100;
/// HWPUNITs per millimeter.
pub const HWPUNITS_PER_MM: f64 = HWPUNITS_PER_INCH as f64 / 25.4;

#[inline]
pub fn hwpunit_to_mm(v: u32) -> f64 {
    v as f64 / HWPUNITS_PER_MM
}

#[inline]
pub fn mm_to_hwpunit(mm: f64) -> u32 {
    (mm * HWPUNITS_PER_MM).round() as u32
}

#[inline]
pub fn hwpunit_to_pt(v: u32) -> f64 {
    v as f64 / HWPUNITS_PER_PT as f64
}

#[inline]
pub fn pt_to_hwpunit(pt: f64) -> u32 {
    (pt * HWPUNITS_PER_PT as f64).round() as u32
}

/// Convert a character height in hundredths of a point to points.
#[inline]
pub fn height_hundredths_to_pt(height: u32) -> f64 {
    height as f64 / 100.0
}

/// Convert points to a character height in hundredths of a point.
#[inline]
pub fn pt_to_height_hundredths(pt: f64) -> u32 {
    (pt * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hwpunit_mm_round_trip() {
        // A4 paper width: 210 mm
        let units = mm_to_hwpunit(210.0);
        assert!((hwpunit_to_mm(units) - 210.0).abs() < 0.01);
    }

    #[test]
    fn test_height_hundredths() {
        assert_eq!(height_hundredths_to_pt(1000), 10.0);
        assert_eq!(pt_to_height_hundredths(10.0), 1000);
        assert_eq!(pt_to_height_hundredths(14.5), 1450);
    }

    #[test]
    fn test_pt_conversions() {
        assert_eq!(pt_to_hwpunit(72.0), 7200);
        assert_eq!(hwpunit_to_pt(7200), 72.0);
    }
}
