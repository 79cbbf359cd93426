use serde::Serialize;
use tracing::warn;

/// How a recorded issue affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// The unit was excluded from allocation.
    ConfigurationError,
    /// The unit was allocated, but with a caveat worth auditing.
    DataQualityWarning,
}

impl IssueSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConfigurationError => "Configuration error",
            Self::DataQualityWarning => "Data quality warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ConstituencyWithoutCouncil,
    DuplicateConstituency,
    CouncilRowWithoutCode,
    DuplicateCouncilTransactions,
    CouncilWithoutTransactions,
    CouncilWithoutConstituencies,
    UnknownProxyConstituency,
    DuplicateProxyRow,
    InvalidProxyRatio,
    PopulationFallback,
    EqualSplitFallback,
    ZeroTransactions,
    TransactionTotalMismatch,
}

impl IssueKind {
    pub const fn severity(self) -> IssueSeverity {
        match self {
            Self::ConstituencyWithoutCouncil
            | Self::DuplicateConstituency
            | Self::CouncilRowWithoutCode
            | Self::DuplicateCouncilTransactions
            | Self::CouncilWithoutTransactions
            | Self::CouncilWithoutConstituencies => IssueSeverity::ConfigurationError,
            Self::UnknownProxyConstituency
            | Self::DuplicateProxyRow
            | Self::InvalidProxyRatio
            | Self::PopulationFallback
            | Self::EqualSplitFallback
            | Self::ZeroTransactions
            | Self::TransactionTotalMismatch => IssueSeverity::DataQualityWarning,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ConstituencyWithoutCouncil => "Constituency has no parent council",
            Self::DuplicateConstituency => "Duplicate constituency row",
            Self::CouncilRowWithoutCode => "Transaction row has no council code",
            Self::DuplicateCouncilTransactions => "Duplicate council transaction row",
            Self::CouncilWithoutTransactions => "Council missing from transaction data",
            Self::CouncilWithoutConstituencies => "Council missing from constituency list",
            Self::UnknownProxyConstituency => "Proxy row for unknown constituency",
            Self::DuplicateProxyRow => "Duplicate proxy row",
            Self::InvalidProxyRatio => "Proxy ratio outside [0, 1]",
            Self::PopulationFallback => "Population-only weighting engaged",
            Self::EqualSplitFallback => "Equal-split weighting engaged",
            Self::ZeroTransactions => "Council has no transactions",
            Self::TransactionTotalMismatch => "Transaction totals disagree",
        }
    }
}

/// One excluded unit or caveat, kept so outputs stay auditable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    /// Code of the affected unit, or `national` for run-wide annotations.
    pub subject: String,
    pub detail: String,
}

/// Collects issues across the pipeline stages in the order they were found.
#[derive(Debug, Default, Clone)]
pub struct IssueLog {
    issues: Vec<AllocationIssue>,
}

impl IssueLog {
    pub fn record(&mut self, kind: IssueKind, subject: impl Into<String>, detail: impl Into<String>) {
        let issue = AllocationIssue {
            kind,
            severity: kind.severity(),
            subject: subject.into(),
            detail: detail.into(),
        };
        warn!(
            kind = ?issue.kind,
            subject = %issue.subject,
            "{}",
            issue.detail
        );
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[AllocationIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains(&self, kind: IssueKind, subject: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.kind == kind && issue.subject == subject)
    }

    pub fn into_vec(self) -> Vec<AllocationIssue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_derives_severity_from_kind() {
        let mut log = IssueLog::default();
        log.record(IssueKind::PopulationFallback, "S12000013", "proxy absent");
        log.record(IssueKind::ConstituencyWithoutCouncil, "S16000999", "no council");

        let issues = log.issues();
        assert_eq!(issues[0].severity, IssueSeverity::DataQualityWarning);
        assert_eq!(issues[1].severity, IssueSeverity::ConfigurationError);
        assert!(log.contains(IssueKind::PopulationFallback, "S12000013"));
        assert!(!log.contains(IssueKind::PopulationFallback, "S16000999"));
    }
}
