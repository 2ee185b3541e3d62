use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the six independent data categories synchronized from the ERP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Customers,
    Products,
    Prices,
    Orders,
    TransportDocuments,
    Invoices,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Customers,
        Domain::Products,
        Domain::Prices,
        Domain::Orders,
        Domain::TransportDocuments,
        Domain::Invoices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Customers => "customers",
            Domain::Products => "products",
            Domain::Prices => "prices",
            Domain::Orders => "orders",
            Domain::TransportDocuments => "transport_documents",
            Domain::Invoices => "invoices",
        }
    }

    pub fn parse(s: &str) -> Option<Domain> {
        match s {
            "customers" => Some(Domain::Customers),
            "products" => Some(Domain::Products),
            "prices" => Some(Domain::Prices),
            "orders" => Some(Domain::Orders),
            "transport_documents" | "ddt" => Some(Domain::TransportDocuments),
            "invoices" => Some(Domain::Invoices),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
