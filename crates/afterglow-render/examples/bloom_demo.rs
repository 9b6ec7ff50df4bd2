//! Renders a synthetic frame through the bloom pipeline headlessly and
//! writes the source and the composited result as PNGs.

use afterglow_core::{BloomSettings, Extent};
use afterglow_render::{BloomPipeline, RenderContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let context = pollster::block_on(RenderContext::new_headless())?;
    let output = Extent::new(640, 360);

    // Dim gradient backdrop with a few over-threshold emitters
    let mut pixels = vec![0u8; (output.width * output.height * 4) as usize];
    for y in 0..output.height {
        for x in 0..output.width {
            let i = ((y * output.width + x) * 4) as usize;
            let shade = (30.0 + 50.0 * (y as f32 / output.height as f32)) as u8;
            pixels[i] = shade;
            pixels[i + 1] = shade;
            pixels[i + 2] = (u32::from(shade) + 20).min(255) as u8;
            pixels[i + 3] = 255;
        }
    }
    for (cx, cy, radius) in [(160i64, 120i64, 6i64), (420, 200, 10), (520, 80, 4)] {
        for y in (cy - radius).max(0)..(cy + radius).min(output.height as i64) {
            for x in (cx - radius).max(0)..(cx + radius).min(output.width as i64) {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= radius * radius {
                    let i = ((y as u32 * output.width + x as u32) * 4) as usize;
                    pixels[i..i + 4].copy_from_slice(&[255, 255, 230, 255]);
                }
            }
        }
    }

    let (source_texture, source_view) = context.create_frame_texture("Demo Source", output);
    let (target_texture, target_view) = context.create_frame_texture("Demo Target", output);
    context.write_frame_texture(&source_texture, output, &pixels);

    let settings = BloomSettings::default();
    let mut pipeline = BloomPipeline::new(&context)?;
    pipeline.activate(&context, &settings, output)?;
    pipeline.render_frame(&context, &source_view, &target_view, output, &settings);

    let composited = pollster::block_on(context.read_pixels(&target_texture, output))?;
    save_png("bloom_demo_source.png", output, &pixels)?;
    save_png("bloom_demo.png", output, &composited)?;
    println!("Wrote bloom_demo_source.png and bloom_demo.png");
    Ok(())
}

fn save_png(path: &str, extent: Extent, pixels: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::RgbaImage::from_raw(extent.width, extent.height, pixels.to_vec())
        .ok_or("pixel buffer does not match image dimensions")?;
    image.save(path)?;
    Ok(())
}
