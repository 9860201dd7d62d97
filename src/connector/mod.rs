//! Contains the valve train and the **VANOS** control maps that phase it
pub mod valve;
pub mod vanos;
