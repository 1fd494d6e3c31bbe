pub mod ebics_tx;
pub mod host;
pub mod ids;
pub mod ledger;
pub mod statement;
pub mod subscriber;
pub mod withdrawal;

pub use ebics_tx::{EbicsDownloadTx, EbicsUploadTx, OrderSignature, OrderType, TransactionPhase};
pub use host::{BankAccount, Customer, Demobank, Host};
pub use ids::{AccountId, HostId, OrderId, SubscriberId, TransactionId};
pub use ledger::{BankTransaction, Direction, FreshTransaction};
pub use statement::Statement;
pub use subscriber::{Subscriber, SubscriberState};
pub use withdrawal::{WithdrawalOp, WithdrawalState};
