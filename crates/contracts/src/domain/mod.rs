pub mod a001_marketplace_return;
