// Domain services - each service handles a specific concern of the EBICS
// banking sandbox, composed together by `Engine`.

mod key_management_service;
mod ledger_service;
mod statement_service;
mod transaction_service;
mod withdrawal_service;

pub use key_management_service::KeyManagementService;
pub use ledger_service::LedgerService;
pub use statement_service::StatementService;
pub use transaction_service::TransactionService;
pub use withdrawal_service::WithdrawalService;
