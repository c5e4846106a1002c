pub mod u501_enrich_returns;
