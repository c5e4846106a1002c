pub mod d400_returns_console;
