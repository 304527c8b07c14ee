use std::fmt;
use std::str::FromStr;

/// Scale family a prefix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixBase {
    Decimal,
    Binary,
}

impl PrefixBase {
    pub fn step(self) -> f64 {
        match self {
            Self::Decimal => 1000.0,
            Self::Binary => 1024.0,
        }
    }

    /// Lowest and highest level available in this family.
    pub fn levels(self) -> (i32, i32) {
        match self {
            Self::Decimal => (-3, 4),
            Self::Binary => (0, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Nano,
    Micro,
    Milli,
    One,
    Kilo,
    Mega,
    Giga,
    Tera,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
}

impl Prefix {
    /// Power of the family step this prefix stands for.
    pub fn level(self) -> i32 {
        match self {
            Self::Nano => -3,
            Self::Micro => -2,
            Self::Milli => -1,
            Self::One => 0,
            Self::Kilo | Self::Kibi => 1,
            Self::Mega | Self::Mebi => 2,
            Self::Giga | Self::Gibi => 3,
            Self::Tera | Self::Tebi => 4,
        }
    }

    pub fn base(self) -> PrefixBase {
        match self {
            Self::Kibi | Self::Mebi | Self::Gibi | Self::Tebi => PrefixBase::Binary,
            _ => PrefixBase::Decimal,
        }
    }

    pub fn from_level(level: i32, base: PrefixBase) -> Self {
        let (lo, hi) = base.levels();
        match (base, level.clamp(lo, hi)) {
            (PrefixBase::Decimal, -3) => Self::Nano,
            (PrefixBase::Decimal, -2) => Self::Micro,
            (PrefixBase::Decimal, -1) => Self::Milli,
            (PrefixBase::Decimal, 1) => Self::Kilo,
            (PrefixBase::Decimal, 2) => Self::Mega,
            (PrefixBase::Decimal, 3) => Self::Giga,
            (PrefixBase::Decimal, 4) => Self::Tera,
            (PrefixBase::Binary, 1) => Self::Kibi,
            (PrefixBase::Binary, 2) => Self::Mebi,
            (PrefixBase::Binary, 3) => Self::Gibi,
            (PrefixBase::Binary, 4) => Self::Tebi,
            _ => Self::One,
        }
    }

    pub fn factor(self) -> f64 {
        self.base().step().powi(self.level())
    }

    /// Scale a raw value into this prefix.
    pub fn apply(self, value: f64) -> f64 {
        value / self.factor()
    }
}

/// Level that keeps `value` in `[1, step)` once scaled.
pub fn auto_level(value: f64, base: PrefixBase) -> i32 {
    let magnitude = value.abs();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return 0;
    }
    (magnitude.ln() / base.step().ln()).floor() as i32
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nano => "n",
            Self::Micro => "µ",
            Self::Milli => "m",
            Self::One => "",
            Self::Kilo => "K",
            Self::Mega => "M",
            Self::Giga => "G",
            Self::Tera => "T",
            Self::Kibi => "Ki",
            Self::Mebi => "Mi",
            Self::Gibi => "Gi",
            Self::Tebi => "Ti",
        })
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "n" => Self::Nano,
            "u" | "µ" => Self::Micro,
            "m" => Self::Milli,
            "1" | "" => Self::One,
            "k" | "K" => Self::Kilo,
            "M" => Self::Mega,
            "G" => Self::Giga,
            "T" => Self::Tera,
            "Ki" => Self::Kibi,
            "Mi" => Self::Mebi,
            "Gi" => Self::Gibi,
            "Ti" => Self::Tebi,
            other => return Err(format!("unknown prefix `{other}`")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_level_picks_largest_fitting_prefix() {
        assert_eq!(auto_level(999.0, PrefixBase::Binary), 0);
        assert_eq!(auto_level(1536.0, PrefixBase::Binary), 1);
        assert_eq!(auto_level(1536.0, PrefixBase::Decimal), 1);
        assert_eq!(auto_level(0.002, PrefixBase::Decimal), -1);
        assert_eq!(auto_level(0.0, PrefixBase::Decimal), 0);
    }

    #[test]
    fn from_level_clamps_to_family() {
        assert_eq!(Prefix::from_level(2, PrefixBase::Binary), Prefix::Mebi);
        assert_eq!(Prefix::from_level(-2, PrefixBase::Binary), Prefix::One);
        assert_eq!(Prefix::from_level(9, PrefixBase::Decimal), Prefix::Tera);
    }

    #[test]
    fn apply_scales_by_factor() {
        assert_eq!(Prefix::Kibi.apply(1536.0), 1.5);
        assert_eq!(Prefix::Milli.apply(0.25), 250.0);
        assert_eq!("Gi".parse::<Prefix>(), Ok(Prefix::Gibi));
        assert!("X".parse::<Prefix>().is_err());
    }
}
