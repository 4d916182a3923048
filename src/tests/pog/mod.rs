mod context;
mod definitions;
mod driver;
mod expressions;
