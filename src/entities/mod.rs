pub mod cart;
pub mod cart_item;
pub mod coupon;
pub mod device_token;
pub mod order;
pub mod order_item;
pub mod points_account;
pub mod points_transaction;
pub mod product;
pub mod store;
pub mod wallet;
pub mod wallet_transaction;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use coupon::Entity as Coupon;
pub use device_token::Entity as DeviceToken;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use points_account::Entity as PointsAccount;
pub use points_transaction::Entity as PointsTransaction;
pub use product::Entity as Product;
pub use store::Entity as Store;
pub use wallet::Entity as Wallet;
pub use wallet_transaction::Entity as WalletTransaction;
