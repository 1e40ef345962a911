pub mod canvas;
pub mod frame;
pub mod lights;
pub mod mask;
pub mod stamp;
