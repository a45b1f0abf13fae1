use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::session::UserId;

/// 17-character VINs use a restricted alphabet: I, O and Q are excluded
/// because they read as 1 and 0.
const VIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ0123456789";
const VIN_PREFIX: &str = "WVW";
const VIN_RANDOM_LEN: usize = 14;

const GIVEN_NAMES: [&str; 5] = ["Oleksandr", "Maria", "Ivan", "Andriy", "Kateryna"];
const FAMILY_NAMES: [&str; 5] = ["Petrenko", "Ivanov", "Koval", "Melnyk", "Shevchenko"];
const BRANDS: [&str; 5] = ["Volkswagen", "Ford", "Honda", "Skoda", "Toyota"];
const MODELS: [&str; 5] = ["Golf", "Focus", "Civic", "Octavia", "Passat"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityFields {
    pub given_name: String,
    pub family_name: String,
    pub document_number: String,
}

impl IdentityFields {
    pub fn rows(&self) -> [(&'static str, &str); 3] {
        [
            ("First name", &self.given_name),
            ("Last name", &self.family_name),
            ("Passport number", &self.document_number),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VehicleFields {
    pub vin: String,
    pub brand: String,
    pub model: String,
}

impl VehicleFields {
    pub fn rows(&self) -> [(&'static str, &str); 3] {
        [("VIN", &self.vin), ("Brand", &self.brand), ("Model", &self.model)]
    }
}

/// The mock cannot fail, but a real recognition service replacing it can;
/// the dialog treats this as retryable at the vehicle-document step.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("document recognition failed: {0}")]
    Recognition(String),
}

/// Document-data extraction seam. Implementations must be deterministic per
/// user where they are mocks, and may fail where they are real.
pub trait DocumentExtractor: Send + Sync {
    fn extract_identity(&self, user: UserId) -> Result<IdentityFields, ExtractionError>;
    fn extract_vehicle(&self, user: UserId) -> Result<VehicleFields, ExtractionError>;
}

/// Stand-in for a real recognition service. Seeding the generator with the
/// user id makes re-running a dialog for a test user reproducible.
#[derive(Clone, Debug, Default)]
pub struct SeededExtractor;

impl SeededExtractor {
    fn rng_for(user: UserId) -> StdRng {
        StdRng::seed_from_u64(user.0 as u64)
    }
}

impl DocumentExtractor for SeededExtractor {
    fn extract_identity(&self, user: UserId) -> Result<IdentityFields, ExtractionError> {
        let mut rng = Self::rng_for(user);
        Ok(IdentityFields {
            given_name: pick(&mut rng, &GIVEN_NAMES),
            family_name: pick(&mut rng, &FAMILY_NAMES),
            document_number: format!("AA{}", rng.gen_range(100_000..=999_999)),
        })
    }

    fn extract_vehicle(&self, user: UserId) -> Result<VehicleFields, ExtractionError> {
        let mut rng = Self::rng_for(user);
        let vin: String = (0..VIN_RANDOM_LEN)
            .map(|_| VIN_ALPHABET[rng.gen_range(0..VIN_ALPHABET.len())] as char)
            .collect();
        Ok(VehicleFields {
            vin: format!("{VIN_PREFIX}{vin}"),
            brand: pick(&mut rng, &BRANDS),
            model: pick(&mut rng, &MODELS),
        })
    }
}

fn pick(rng: &mut StdRng, pool: &[&str]) -> String {
    pool[rng.gen_range(0..pool.len())].to_owned()
}

#[cfg(test)]
mod tests {
    use super::{DocumentExtractor, SeededExtractor, VIN_ALPHABET, VIN_PREFIX};
    use crate::session::UserId;

    #[test]
    fn extraction_is_deterministic_per_user() {
        let extractor = SeededExtractor;
        for raw in [0_i64, 1, 42, 9_999_999] {
            let user = UserId(raw);
            assert_eq!(
                extractor.extract_identity(user).expect("mock cannot fail"),
                extractor.extract_identity(user).expect("mock cannot fail"),
            );
            assert_eq!(
                extractor.extract_vehicle(user).expect("mock cannot fail"),
                extractor.extract_vehicle(user).expect("mock cannot fail"),
            );
        }
    }

    #[test]
    fn different_users_can_diverge() {
        let extractor = SeededExtractor;
        let a = extractor.extract_vehicle(UserId(1)).expect("mock cannot fail");
        let b = extractor.extract_vehicle(UserId(2)).expect("mock cannot fail");
        assert_ne!(a.vin, b.vin);
    }

    #[test]
    fn vin_matches_prefix_length_and_alphabet() {
        let extractor = SeededExtractor;
        for raw in 0..50_i64 {
            let vehicle = extractor.extract_vehicle(UserId(raw)).expect("mock cannot fail");
            assert_eq!(vehicle.vin.len(), 17);
            assert!(vehicle.vin.starts_with(VIN_PREFIX));
            for byte in vehicle.vin.as_bytes()[VIN_PREFIX.len()..].iter() {
                assert!(VIN_ALPHABET.contains(byte), "unexpected VIN char {}", *byte as char);
            }
            assert!(!vehicle.vin.contains(['I', 'O', 'Q']));
        }
    }

    #[test]
    fn identity_document_number_has_the_fixed_shape() {
        let extractor = SeededExtractor;
        let identity = extractor.extract_identity(UserId(42)).expect("mock cannot fail");
        assert!(identity.document_number.starts_with("AA"));
        assert_eq!(identity.document_number.len(), 8);
        assert!(identity.document_number[2..].bytes().all(|b| b.is_ascii_digit()));
    }
}
