//! Registry of named string generators backed by `fake`.

use std::collections::HashMap;
use std::sync::OnceLock;

use fake::Fake;
use fake::faker::address::en::{
    BuildingNumber, CityName, CountryName, StateName, StreetName, ZipCode,
};
use fake::faker::company::en::{CatchPhrase, CompanyName, Industry};
use fake::faker::currency::en::CurrencyCode;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, Username};
use fake::faker::job::en::Title;
use fake::faker::lorem::en::{Paragraph, Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::{Rng, RngCore};

/// Named generator kinds. Ids are stable and used in plan files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedGenerator {
    CompanyName,
    FirstName,
    LastName,
    FullName,
    SafeEmail,
    Username,
    PhoneNumber,
    StreetAddress,
    City,
    State,
    ZipCode,
    Country,
    Url,
    JobTitle,
    Industry,
    CatchPhrase,
    CurrencyCode,
    Word,
    Sentence,
    Paragraph,
}

impl NamedGenerator {
    pub const ALL: &'static [NamedGenerator] = &[
        NamedGenerator::CompanyName,
        NamedGenerator::FirstName,
        NamedGenerator::LastName,
        NamedGenerator::FullName,
        NamedGenerator::SafeEmail,
        NamedGenerator::Username,
        NamedGenerator::PhoneNumber,
        NamedGenerator::StreetAddress,
        NamedGenerator::City,
        NamedGenerator::State,
        NamedGenerator::ZipCode,
        NamedGenerator::Country,
        NamedGenerator::Url,
        NamedGenerator::JobTitle,
        NamedGenerator::Industry,
        NamedGenerator::CatchPhrase,
        NamedGenerator::CurrencyCode,
        NamedGenerator::Word,
        NamedGenerator::Sentence,
        NamedGenerator::Paragraph,
    ];

    pub fn id(self) -> &'static str {
        match self {
            NamedGenerator::CompanyName => "company_name",
            NamedGenerator::FirstName => "first_name",
            NamedGenerator::LastName => "last_name",
            NamedGenerator::FullName => "full_name",
            NamedGenerator::SafeEmail => "safe_email",
            NamedGenerator::Username => "username",
            NamedGenerator::PhoneNumber => "phone_number",
            NamedGenerator::StreetAddress => "street_address",
            NamedGenerator::City => "city",
            NamedGenerator::State => "state",
            NamedGenerator::ZipCode => "zip_code",
            NamedGenerator::Country => "country",
            NamedGenerator::Url => "url",
            NamedGenerator::JobTitle => "job_title",
            NamedGenerator::Industry => "industry",
            NamedGenerator::CatchPhrase => "catch_phrase",
            NamedGenerator::CurrencyCode => "currency_code",
            NamedGenerator::Word => "word",
            NamedGenerator::Sentence => "sentence",
            NamedGenerator::Paragraph => "paragraph",
        }
    }

    /// Keywords describing the values, used by the keyword matcher.
    pub fn description(self) -> &'static str {
        match self {
            NamedGenerator::CompanyName => {
                "company name business organization vendor supplier customer employer brand"
            }
            NamedGenerator::FirstName => "first given forename name person",
            NamedGenerator::LastName => "last family surname name person",
            NamedGenerator::FullName => "full name person contact author owner",
            NamedGenerator::SafeEmail => "email mail address contact",
            NamedGenerator::Username => "username login handle nickname user",
            NamedGenerator::PhoneNumber => "phone telephone mobile cell fax number contact",
            NamedGenerator::StreetAddress => "street address line road shipping billing",
            NamedGenerator::City => "city town municipality locality",
            NamedGenerator::State => "state province region",
            NamedGenerator::ZipCode => "zip postal postcode code",
            NamedGenerator::Country => "country nation",
            NamedGenerator::Url => "url website link homepage site uri",
            NamedGenerator::JobTitle => "job title position role occupation",
            NamedGenerator::Industry => "industry sector segment vertical",
            NamedGenerator::CatchPhrase => "slogan tagline motto catchphrase headline",
            NamedGenerator::CurrencyCode => "currency code iso",
            NamedGenerator::Word => "word tag label keyword category type kind",
            NamedGenerator::Sentence => "sentence summary subject caption comment note",
            NamedGenerator::Paragraph => "paragraph description body text content bio details",
        }
    }

    /// Resolve a plan id. The lookup table is built once per process.
    pub fn from_id(id: &str) -> Option<Self> {
        static LOOKUP: OnceLock<HashMap<&'static str, NamedGenerator>> = OnceLock::new();
        LOOKUP
            .get_or_init(|| Self::ALL.iter().map(|named| (named.id(), *named)).collect())
            .get(id)
            .copied()
    }

    pub fn known_ids() -> Vec<&'static str> {
        Self::ALL.iter().map(|named| named.id()).collect()
    }

    pub fn generate(self, rng: &mut dyn RngCore) -> String {
        match self {
            NamedGenerator::CompanyName => CompanyName().fake_with_rng(rng),
            NamedGenerator::FirstName => FirstName().fake_with_rng(rng),
            NamedGenerator::LastName => LastName().fake_with_rng(rng),
            NamedGenerator::FullName => Name().fake_with_rng(rng),
            NamedGenerator::SafeEmail => SafeEmail().fake_with_rng(rng),
            NamedGenerator::Username => Username().fake_with_rng(rng),
            NamedGenerator::PhoneNumber => PhoneNumber().fake_with_rng(rng),
            NamedGenerator::StreetAddress => {
                let number: String = BuildingNumber().fake_with_rng(rng);
                let street: String = StreetName().fake_with_rng(rng);
                format!("{number} {street}")
            }
            NamedGenerator::City => CityName().fake_with_rng(rng),
            NamedGenerator::State => StateName().fake_with_rng(rng),
            NamedGenerator::ZipCode => ZipCode().fake_with_rng(rng),
            NamedGenerator::Country => CountryName().fake_with_rng(rng),
            NamedGenerator::Url => {
                let word: String = Word().fake_with_rng(rng);
                let suffix: String = DomainSuffix().fake_with_rng(rng);
                format!("https://{word}{}.{suffix}", rng.random_range(1..1000))
            }
            NamedGenerator::JobTitle => Title().fake_with_rng(rng),
            NamedGenerator::Industry => Industry().fake_with_rng(rng),
            NamedGenerator::CatchPhrase => CatchPhrase().fake_with_rng(rng),
            NamedGenerator::CurrencyCode => CurrencyCode().fake_with_rng(rng),
            NamedGenerator::Word => Word().fake_with_rng(rng),
            NamedGenerator::Sentence => Sentence(3..8).fake_with_rng(rng),
            NamedGenerator::Paragraph => Paragraph(1..3).fake_with_rng(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn ids_round_trip_through_lookup() {
        for named in NamedGenerator::ALL {
            assert_eq!(NamedGenerator::from_id(named.id()), Some(*named));
        }
        assert_eq!(NamedGenerator::from_id("warp_drive"), None);
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut left = ChaCha8Rng::seed_from_u64(11);
        let mut right = ChaCha8Rng::seed_from_u64(11);
        for named in NamedGenerator::ALL {
            assert_eq!(named.generate(&mut left), named.generate(&mut right));
        }
    }

    #[test]
    fn email_looks_like_an_email() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let email = NamedGenerator::SafeEmail.generate(&mut rng);
        assert!(email.contains('@'), "{email}");
    }
}
