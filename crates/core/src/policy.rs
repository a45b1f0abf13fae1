use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tera::{Context, Tera};
use thiserror::Error;

use crate::extraction::{IdentityFields, VehicleFields};
use crate::session::UserId;
use crate::storage::{DocumentStore, StorageError};

const POLICY_NUMBER_PREFIX: &str = "PL";
const PREMIUM_USD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const VALIDITY: &str = "1 year";

const POLICY_TEMPLATE_NAME: &str = "policy.txt";
const POLICY_TEMPLATE: &str = "\
INSURANCE POLICY No. {{ policy_number }}
Issued on: {{ issued_on }}

Policyholder:
First name: {{ given_name }}
Last name: {{ family_name }}
Passport number: {{ document_number }}

Vehicle:
Brand: {{ brand }}
Model: {{ model }}
VIN: {{ vin }}

Premium: {{ premium }} USD
Valid for: {{ validity }}
";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy template rendering failed: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The issued artifact: where it was written plus the metadata the transport
/// layer needs to deliver it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyArtifact {
    pub reference: PathBuf,
    pub policy_number: String,
    pub filename: String,
    pub issued_on: NaiveDate,
}

/// Renders and stores the policy document. Not idempotent: every call mints
/// a fresh policy number and overwrites the user's previous artifact, so the
/// dialog must invoke it at most once per completed pass.
pub struct PolicyGenerator {
    templates: Tera,
    store: Arc<dyn DocumentStore>,
}

impl PolicyGenerator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let mut templates = Tera::default();
        templates
            .add_raw_template(POLICY_TEMPLATE_NAME, POLICY_TEMPLATE)
            .expect("embedded policy template is valid");
        Self { templates, store }
    }

    pub async fn generate(
        &self,
        user: UserId,
        identity: &IdentityFields,
        vehicle: &VehicleFields,
    ) -> Result<PolicyArtifact, PolicyError> {
        let policy_number = mint_policy_number();
        let issued_on = Utc::now().date_naive();

        let mut context = Context::new();
        context.insert("policy_number", &policy_number);
        context.insert("issued_on", &issued_on.format("%Y-%m-%d").to_string());
        context.insert("given_name", &identity.given_name);
        context.insert("family_name", &identity.family_name);
        context.insert("document_number", &identity.document_number);
        context.insert("brand", &vehicle.brand);
        context.insert("model", &vehicle.model);
        context.insert("vin", &vehicle.vin);
        context.insert("premium", &PREMIUM_USD.to_string());
        context.insert("validity", VALIDITY);

        let content = self.templates.render(POLICY_TEMPLATE_NAME, &context)?;
        let reference = self.store.save_artifact(user, &format!("policy_{user}.txt"), &content).await?;

        Ok(PolicyArtifact {
            reference,
            policy_number,
            filename: format!("insurance_policy_{user}.txt"),
            issued_on,
        })
    }
}

fn mint_policy_number() -> String {
    let suffix = rand::thread_rng().gen_range(100_000..=999_999);
    format!("{POLICY_NUMBER_PREFIX}-{suffix}")
}
