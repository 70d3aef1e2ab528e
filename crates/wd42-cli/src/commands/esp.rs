//! ESP frame dump command.
//!
//! Runs the reader and renderer together and prints each frame's draw
//! commands. A real overlay window would implement [`DrawSink`] instead.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::info;
use wd42_core::{
    Config, DrawCommand, DrawSink, EntityReader, EspRenderer, QueryMemory, Viewport,
    find_window_rect,
};

use super::shutdown_on_ctrlc;

const FRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Prints draw commands to stdout.
#[derive(Default)]
pub struct ConsoleSink {
    pub commands: usize,
}

impl DrawSink for ConsoleSink {
    fn draw(&mut self, command: DrawCommand) {
        self.commands += 1;
        println!("  {}", describe(&command));
    }
}

pub fn describe(command: &DrawCommand) -> String {
    match command {
        DrawCommand::Rect {
            x,
            y,
            w,
            h,
            color,
            thickness,
        } => format!(
            "rect  ({:.0}, {:.0}) {:.0}x{:.0} #{:08X} {}px",
            x,
            y,
            w,
            h,
            color.to_argb(),
            thickness
        ),
        DrawCommand::Line {
            from,
            to,
            color,
            thickness,
        } => format!(
            "line  ({:.0}, {:.0}) -> ({:.0}, {:.0}) #{:08X} {}px",
            from.x,
            from.y,
            to.x,
            to.y,
            color.to_argb(),
            thickness
        ),
        DrawCommand::Text { x, y, text, color } => {
            format!("text  ({:.0}, {:.0}) #{:08X} {:?}", x, y, color.to_argb(), text)
        }
    }
}

pub fn run<R>(reader: R, config: &Config, width: u32, height: u32, window: Option<&str>) -> Result<()>
where
    R: QueryMemory + Send + Sync + 'static,
{
    let viewport = match window {
        Some(title) => {
            let rect = find_window_rect(title)?;
            info!(
                "Overlay on '{}' at ({}, {}) {}x{}",
                title, rect.x, rect.y, rect.width, rect.height
            );
            Viewport::from(rect)
        }
        None => Viewport::new(0.0, 0.0, width as f32, height as f32),
    };

    let shutdown = shutdown_on_ctrlc()?;
    let mut entity_reader = EntityReader::new(config.reader_settings());
    entity_reader.start(Arc::new(reader))?;
    entity_reader.set_entity_read_enabled(true);

    let renderer = EspRenderer::new(config.esp, config.camera);
    let mut frame = 0u64;

    while !shutdown.wait(FRAME_INTERVAL) {
        frame += 1;
        let entities = entity_reader.entities();
        println!(
            "{} {} ({} entities)",
            "Frame".bold(),
            frame,
            entities.len()
        );

        let mut sink = ConsoleSink::default();
        let drawn = renderer.render(&entities, &viewport, &mut sink);
        if drawn == 0 {
            println!("  {}", entity_reader.status().dimmed());
        }
    }

    entity_reader.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd42_core::Color;

    #[test]
    fn test_describe_commands() {
        let rect = DrawCommand::Rect {
            x: 10.4,
            y: 20.6,
            w: 30.0,
            h: 60.0,
            color: Color::new(255, 0, 0, 255),
            thickness: 2.0,
        };
        assert_eq!(describe(&rect), "rect  (10, 21) 30x60 #FFFF0000 2px");

        let text = DrawCommand::Text {
            x: 10.0,
            y: 6.0,
            text: "#3 [12m]".to_string(),
            color: Color::WHITE,
        };
        assert_eq!(describe(&text), "text  (10, 6) #FFFFFFFF \"#3 [12m]\"");
    }
}
