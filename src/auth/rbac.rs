/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Roles are a closed enum carried in a verified token claim. Each role maps to
 * a fixed capability set; routes declare the capability they need.
 */

use crate::entities::user::Role;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Actions a caller may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Place an order tied to the caller's account
    PlaceOrder,
    /// List and read the caller's own orders
    ViewOwnOrders,
    /// Read any single order
    ViewAnyOrder,
    /// List every order with filters
    ListAllOrders,
    /// Look an order up by its display number
    LookupOrderNumber,
    /// Move orders through the preparation workflow
    ManageOrderStatus,
}

const MEMBER_CAPABILITIES: &[Capability] = &[Capability::PlaceOrder, Capability::ViewOwnOrders];

const KIOSK_CAPABILITIES: &[Capability] = &[Capability::PlaceOrder];

const BARISTA_CAPABILITIES: &[Capability] = &[
    Capability::ViewAnyOrder,
    Capability::ListAllOrders,
    Capability::ManageOrderStatus,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::PlaceOrder,
    Capability::ViewOwnOrders,
    Capability::ViewAnyOrder,
    Capability::ListAllOrders,
    Capability::LookupOrderNumber,
    Capability::ManageOrderStatus,
];

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Member => MEMBER_CAPABILITIES,
            Role::Kiosk => KIOSK_CAPABILITIES,
            Role::Barista => BARISTA_CAPABILITIES,
            Role::Admin => ADMIN_CAPABILITIES,
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}
