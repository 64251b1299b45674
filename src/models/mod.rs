pub mod card;
pub mod customer;
pub mod invoice;
pub mod revenue;

pub use card::{CardSummary, StatusTotals};
pub use customer::{Customer, CustomerField, CustomersTableRaw, FormattedCustomersTable};
pub use invoice::{
    cents_to_dollars, Invoice, InvoiceForm, InvoiceFormRaw, InvoiceStatus, InvoicesTableRow,
    LatestInvoice, LatestInvoiceRaw,
};
pub use revenue::Revenue;
