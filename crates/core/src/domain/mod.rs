pub mod purchase_request;
