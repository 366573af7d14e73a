use serde::{Deserialize, Serialize};

use bizdesk_core::ValueObject;

use crate::Role;

/// A single boolean capability a membership may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ManageOrders,
    ManageProducts,
    ManageSuppliers,
    ViewReports,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ManageUsers,
        Capability::ManageOrders,
        Capability::ManageProducts,
        Capability::ManageSuppliers,
        Capability::ViewReports,
    ];

    /// Stable permission name (e.g. "users.manage").
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ManageUsers => "users.manage",
            Capability::ManageOrders => "orders.manage",
            Capability::ManageProducts => "products.manage",
            Capability::ManageSuppliers => "suppliers.manage",
            Capability::ViewReports => "reports.view",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Capability::ManageUsers => "manage users",
            Capability::ManageOrders => "manage orders",
            Capability::ManageProducts => "manage products",
            Capability::ManageSuppliers => "manage suppliers",
            Capability::ViewReports => "view reports",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized capability flags stored on a membership.
///
/// Only ever built from a role via [`Capabilities::for_role`]; there is no
/// way to toggle a single flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_manage_users: bool,
    pub can_manage_orders: bool,
    pub can_manage_products: bool,
    pub can_manage_suppliers: bool,
    pub can_view_reports: bool,
}

impl ValueObject for Capabilities {}

impl Capabilities {
    /// The fixed role table.
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Owner | Role::Admin => Self {
                can_manage_users: true,
                can_manage_orders: true,
                can_manage_products: true,
                can_manage_suppliers: true,
                can_view_reports: true,
            },
            Role::Manager => Self {
                can_manage_users: false,
                can_manage_orders: true,
                can_manage_products: true,
                can_manage_suppliers: false,
                can_view_reports: true,
            },
            Role::Employee => Self {
                can_manage_users: false,
                can_manage_orders: true,
                can_manage_products: false,
                can_manage_suppliers: false,
                can_view_reports: false,
            },
            Role::Viewer => Self {
                can_manage_users: false,
                can_manage_orders: false,
                can_manage_products: false,
                can_manage_suppliers: false,
                can_view_reports: false,
            },
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageUsers => self.can_manage_users,
            Capability::ManageOrders => self.can_manage_orders,
            Capability::ManageProducts => self.can_manage_products,
            Capability::ManageSuppliers => self.can_manage_suppliers,
            Capability::ViewReports => self.can_view_reports,
        }
    }

    /// Granted capabilities in declaration order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }
}
