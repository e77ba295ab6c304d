#![allow(dead_code)]

pub mod hogtrain_env;
pub mod images;
