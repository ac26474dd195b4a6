pub mod affinity;
pub mod block;
pub mod cache;
pub mod error;
pub mod harness;
pub mod report;
pub mod transpose;

pub use error::BenchError;

const SIZE_UNITS: [(u64, &str); 3] = [
    (1024 * 1024 * 1024, "GiB"),
    (1024 * 1024, "MiB"),
    (1024, "KiB"),
];

/// Convert number of bytes to formatted string
pub fn format_size(bytes: f32) -> String {
    for (scale, unit) in SIZE_UNITS {
        if bytes >= scale as f32 {
            return format!("{:.2} {unit}", bytes / scale as f32);
        }
    }
    format!("{:.2} B", bytes)
}

/// Convert number of bytes to formatted string for fixed-width integer string
pub fn format_size_fixed_int(bytes: u64) -> String {
    for (scale, unit) in SIZE_UNITS {
        if bytes >= scale {
            return format!("{:>4} {unit}", bytes / scale);
        }
    }
    format!("{:>4} B", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512.0), "512.00 B");
        assert_eq!(format_size(4.0 * 1024.0 * 1024.0), "4.00 MiB");
        assert_eq!(format_size_fixed_int(32 * 1024), "  32 KiB");
        assert_eq!(format_size_fixed_int(3 * 1024 * 1024 * 1024), "   3 GiB");
    }
}
