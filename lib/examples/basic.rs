/// Basic example: render a synthetic test image to the terminal
///
/// This paints a gradient background with a bright disc and a diagonal
/// stripe, then renders it in both charsets.
use term_rendr::{Charset, RenderConfig, SourceImage, TaskSystem, render_image};

fn main() {
    // Build a 320x200 test scene in memory
    let width = 320usize;
    let height = 200usize;
    let mut pixels = Vec::with_capacity(width * height * 3);

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let radius = 60.0;

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist < radius {
                // Bright disc in the center
                pixels.extend_from_slice(&[250, 220, 60]);
            } else if x.abs_diff(y) < 6 {
                // Diagonal stripe
                pixels.extend_from_slice(&[220, 40, 40]);
            } else {
                // Blue-to-dark gradient background
                let shade = (255 * y / height) as u8;
                pixels.extend_from_slice(&[20, 40, shade]);
            }
        }
    }

    let img = SourceImage::from_rgb(width, height, pixels);
    let pool = TaskSystem::new(0);
    pool.preheat();

    for charset in [Charset::Low, Charset::High] {
        let config = RenderConfig {
            out_w: 64,
            out_h: 20,
            charset,
            ..Default::default()
        };
        println!("--- {charset:?} ---");
        print!("{}", render_image(&img, &config, &pool));
    }
}
