//! Domain models for studio-service.

mod balance;
mod catalog;
mod client;
mod organization;
mod payment;
mod purchase;
mod report;

pub use balance::{BalanceStatus, ClientBalance, PaidTotal, PurchaseBalance};
pub use catalog::{
    AdjustStock, Bundle, BundleItemDetail, BundleItemInput, BundleWithItems, CreateBundle,
    CreateInventoryItem, InventoryItem, ListBundlesFilter, ListInventoryFilter, SetBundleItems,
    UpdateBundle, UpdateInventoryItem,
};
pub use client::{
    Child, Client, CreateChild, CreateClient, ListChildrenFilter, ListClientsFilter, UpdateChild,
    UpdateClient,
};
pub use organization::{
    CreateOrganization, ListOrganizationsFilter, Organization, OrganizationKind,
    UpdateOrganization,
};
pub use payment::{
    CreatePaymentPlan, MarkPaymentPaid, Payment, PaymentMethod, PaymentPlan,
    PaymentPlanWithInstallments, PaymentStatus, PlanFrequency, RecordPayment,
};
pub use purchase::{CreatePurchase, ListPurchasesFilter, Purchase, PurchaseStatus};
pub use report::{
    CurrencyAmount, DashboardSummary, PaymentReportRow, PaymentsReport, PaymentsReportQuery,
    StatusCount,
};

use serde::Deserialize;

/// Offset pagination shared by list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub page_size: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.page_size.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
