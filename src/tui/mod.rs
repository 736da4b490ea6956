pub mod footer;
pub mod header;
pub mod jobs_pane;
pub mod logs_pane;
pub mod render;
pub mod runs_pane;
pub mod spinner;
pub mod steps_pane;
pub mod widgets;
