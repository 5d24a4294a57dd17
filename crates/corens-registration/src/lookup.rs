//! Domain details for a single name

use corens_core::{
    address_hex, unix_now, DomainName, Error, RecordStatus, RegistrationRecord, Result, Timestamp,
};
use corens_session::ContractGateway;
use serde::Serialize;

/// Registry record of one name, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainInfo {
    pub name: String,
    pub lookup_key: String,
    pub status: RecordStatus,
    pub available: bool,
    pub owner: Option<String>,
    pub resolver: Option<String>,
    pub registered_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

impl DomainInfo {
    fn from_record(name: &DomainName, record: &RegistrationRecord, now: Timestamp) -> Self {
        let owned = record.has_owner();
        Self {
            name: name.as_str().to_string(),
            lookup_key: name.key().to_hex(),
            status: record.status_at(now),
            available: record.is_available_at(now),
            owner: owned.then(|| address_hex(&record.owner)),
            resolver: (!record.resolver.is_zero()).then(|| address_hex(&record.resolver)),
            registered_at: owned.then_some(record.registration_time),
            expires_at: owned.then_some(record.expiration),
        }
    }
}

/// Read the Registry record for `raw`.
///
/// # Errors
/// Name validation errors, or `LookupFailed` when the read fails
pub async fn lookup_domain(gateway: &ContractGateway, raw: &str, suffix: &str) -> Result<DomainInfo> {
    let name = DomainName::parse(raw, suffix)?;
    let record = read_record(gateway, &name).await?;
    Ok(DomainInfo::from_record(&name, &record, unix_now()))
}

/// Registry read with every failure reported as `LookupFailed`
pub(crate) async fn read_record(
    gateway: &ContractGateway,
    name: &DomainName,
) -> Result<RegistrationRecord> {
    let failed = |reason: String| Error::LookupFailed {
        name: name.to_string(),
        reason,
    };

    let registry = gateway
        .registry_client()
        .await
        .map_err(|e| failed(e.to_string()))?;
    registry
        .get_record(name.key())
        .await
        .map_err(|e| failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corens_core::ChainConfig;
    use corens_session::{MemoryMarker, WalletSession};
    use ethers::types::Address;
    use evm_client::mock::MockContracts;
    use std::sync::Arc;

    fn gateway(public: Option<Arc<MockContracts>>) -> ContractGateway {
        let session = WalletSession::new(None, Arc::new(MemoryMarker::default()));
        ContractGateway::new(
            session,
            ChainConfig::default(),
            public.map(|p| p as Arc<dyn evm_client::ContractBackend>),
        )
    }

    #[tokio::test]
    async fn test_unregistered_name() {
        let info = lookup_domain(&gateway(Some(MockContracts::new())), "Alice", ".core")
            .await
            .unwrap();

        assert_eq!(info.name, "alice.core");
        assert_eq!(info.status, RecordStatus::Unregistered);
        assert!(info.available);
        assert!(info.owner.is_none());
        assert!(info.expires_at.is_none());
        assert!(info.lookup_key.starts_with("0x616c696365"));
    }

    #[tokio::test]
    async fn test_active_and_expired_names() {
        let contracts = MockContracts::new();
        let now = unix_now();
        let owner = Address::from_low_u64_be(0xabc);
        contracts.set_record(
            "bob.core",
            RegistrationRecord {
                owner,
                resolver: Address::zero(),
                registration_time: now - 100,
                expiration: now + 3600,
            },
        );
        contracts.set_record(
            "carol.core",
            RegistrationRecord {
                owner,
                resolver: owner,
                registration_time: 1,
                expiration: 2,
            },
        );
        let gateway = gateway(Some(contracts));

        let bob = lookup_domain(&gateway, "bob.core", ".core").await.unwrap();
        assert_eq!(bob.status, RecordStatus::Active);
        assert!(!bob.available);
        assert_eq!(
            bob.owner.as_deref(),
            Some("0x0000000000000000000000000000000000000abc")
        );
        assert!(bob.resolver.is_none());

        let carol = lookup_domain(&gateway, "CAROL", ".core").await.unwrap();
        assert_eq!(carol.status, RecordStatus::Expired);
        assert!(carol.available);
        assert_eq!(carol.expires_at, Some(2));
    }

    #[tokio::test]
    async fn test_failures_are_lookup_failed() {
        let contracts = MockContracts::new();
        contracts.fail_lookups("connection refused");
        let err = lookup_domain(&gateway(Some(contracts)), "bob", ".core")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LookupFailed { ref name, .. } if name == "bob.core"));

        let err = lookup_domain(&gateway(None), "bob", ".core").await.unwrap_err();
        assert!(matches!(err, Error::LookupFailed { .. }));
    }

    #[tokio::test]
    async fn test_too_long_name_is_rejected_before_reading() {
        let contracts = MockContracts::new();
        let err = lookup_domain(&gateway(Some(contracts.clone())), &"a".repeat(40), ".core")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncodingTooLong { .. }));
        assert_eq!(contracts.lookup_count(), 0);
    }
}
