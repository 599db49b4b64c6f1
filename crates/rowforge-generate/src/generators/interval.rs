use rand::{Rng, RngCore};

/// Weighted random interval: mostly short spans, occasionally months or years.
pub fn random_interval(rng: &mut dyn RngCore) -> String {
    let roll = rng.random_range(0..100);
    let seconds: u64 = match roll {
        0..50 => rng.random_range(1..3_600),
        50..80 => rng.random_range(3_600..7 * 86_400),
        80..95 => rng.random_range(7 * 86_400..365 * 86_400),
        _ => rng.random_range(365 * 86_400..5 * 365 * 86_400),
    };
    format_interval(seconds)
}

pub fn format_interval(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    if days == 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{days} days {hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn formats_postgres_interval_literals() {
        assert_eq!(format_interval(0), "00:00:00");
        assert_eq!(format_interval(3_661), "01:01:01");
        assert_eq!(format_interval(2 * 86_400 + 5), "2 days 00:00:05");
    }

    #[test]
    fn random_intervals_are_positive() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            assert_ne!(random_interval(&mut rng), "00:00:00");
        }
    }
}
