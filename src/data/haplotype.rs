//! # Haplotype Definitions
//!
//! The engine's phased output unit and the allele tag that distinguishes the
//! two haplotypes of an individual in reconstructed output.

/// Metadata key that carries the allele tag on output records
pub const ALLELE_FIELD: &str = "allele";

/// Which of the two reconstructed haplotypes a record represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlleleTag {
    A,
    B,
}

impl AlleleTag {
    /// Both tags in emission order
    pub const BOTH: [AlleleTag; 2] = [AlleleTag::A, AlleleTag::B];

    pub fn as_str(self) -> &'static str {
        match self {
            AlleleTag::A => "a",
            AlleleTag::B => "b",
        }
    }
}

impl std::fmt::Display for AlleleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of engine output: the two haplotypes inferred for an identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhasedPair {
    pub identifier: String,
    pub allele_a: String,
    pub allele_b: String,
}

impl PhasedPair {
    pub fn new(
        identifier: impl Into<String>,
        allele_a: impl Into<String>,
        allele_b: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            allele_a: allele_a.into(),
            allele_b: allele_b.into(),
        }
    }

    /// Sequence of the haplotype selected by `tag`
    pub fn allele(&self, tag: AlleleTag) -> &str {
        match tag {
            AlleleTag::A => &self.allele_a,
            AlleleTag::B => &self.allele_b,
        }
    }

    /// True when both haplotypes are identical (homozygous at every site)
    pub fn is_homozygous(&self) -> bool {
        self.allele_a == self.allele_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allele_tags() {
        assert_eq!(AlleleTag::BOTH.map(AlleleTag::as_str), ["a", "b"]);
        assert_eq!(AlleleTag::B.to_string(), "b");
    }

    #[test]
    fn test_pair_allele_lookup() {
        let pair = PhasedPair::new("A1", "ACGT", "ACGA");
        assert_eq!(pair.allele(AlleleTag::A), "ACGT");
        assert_eq!(pair.allele(AlleleTag::B), "ACGA");
        assert!(!pair.is_homozygous());
    }
}
