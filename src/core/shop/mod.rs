mod shop_service;

pub use shop_service::{
    parse_hex_color, validate_role_name, Purchase, RoleExpiry, ShopError, ShopItem, ShopService,
};
