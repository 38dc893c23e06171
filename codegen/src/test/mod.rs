mod interp;
mod target;
