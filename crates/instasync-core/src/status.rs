//! Static code → label tables for the upstream's numeric status fields.

/// An immutable lookup table from integer code to display label.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    pub name: &'static str,
    entries: &'static [(i64, &'static str)],
}

impl StatusTable {
    pub const fn new(name: &'static str, entries: &'static [(i64, &'static str)]) -> Self {
        Self { name, entries }
    }

    /// Label for `code`, or `""` when the code is not in the table.
    pub fn label(&self, code: i64) -> &'static str {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
            .unwrap_or("")
    }

    pub fn entries(&self) -> &'static [(i64, &'static str)] {
        self.entries
    }
}

pub const CAMPAIGN_STATUS: StatusTable = StatusTable::new(
    "campaign_status",
    &[
        (1, "Active"),
        (2, "Paused"),
        (3, "Completed"),
        (4, "Running Subsequences"),
        (-99, "Account Suspended"),
        (-1, "Accounts Unhealthy"),
        (-2, "Bounce Protect"),
    ],
);

pub const LEAD_STATUS: StatusTable = StatusTable::new(
    "lead_status",
    &[
        (1, "Active"),
        (2, "Paused"),
        (3, "Completed"),
        (-1, "Bounced"),
        (-2, "Unsubscribed"),
        (-3, "Skipped"),
    ],
);

pub const LEAD_INTEREST_STATUS: StatusTable = StatusTable::new(
    "lead_interest_status",
    &[
        (0, "Out of Office"),
        (1, "Interested"),
        (2, "Meeting Booked"),
        (3, "Meeting Completed"),
        (4, "Closed"),
        (-1, "Not Interested"),
        (-2, "Wrong Person"),
        (-3, "Lost"),
    ],
);

pub const LEAD_VERIFICATION_STATUS: StatusTable = StatusTable::new(
    "lead_verification_status",
    &[
        (1, "Verified"),
        (11, "Pending"),
        (12, "Pending Verification Job"),
        (-1, "Invalid"),
        (-2, "Risky"),
        (-3, "Catch All"),
        (-4, "Job Change"),
    ],
);

pub const LEAD_ENRICHMENT_STATUS: StatusTable = StatusTable::new(
    "lead_enrichment_status",
    &[
        (1, "Enriched"),
        (11, "Pending"),
        (-1, "Enrichment data not available"),
        (-2, "Error"),
    ],
);

pub const LEAD_UPLOAD_METHOD: StatusTable = StatusTable::new(
    "lead_upload_method",
    &[(1, "Manual"), (2, "API"), (3, "Webhook")],
);

pub const LEAD_ESP_CODE: StatusTable = StatusTable::new(
    "lead_esp_code",
    &[
        (0, "In Queue"),
        (1, "Google"),
        (2, "Microsoft"),
        (3, "Zoho"),
        (9, "Yahoo"),
        (10, "Yandex"),
        (12, "Web.de"),
        (13, "Libero.it"),
        (999, "Other"),
        (1000, "Not Found"),
    ],
);
